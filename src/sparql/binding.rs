//! Query solutions (variable bindings) and solution-sequence operations

use crate::rdf::{Term, Variable};
use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use std::fmt;

/// One query solution: variable name → term
///
/// Solutions are immutable once handed out. Extending or merging produces a
/// new solution, or `None` when a variable would be bound to two different
/// terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySolution {
    bindings: IndexMap<String, Term, FxBuildHasher>,
}

impl QuerySolution {
    /// Create an empty solution
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a binding by variable name
    pub fn get(&self, variable: &str) -> Option<&Term> {
        self.bindings.get(variable)
    }

    /// Get the binding of a variable
    pub fn value(&self, variable: &Variable) -> Option<&Term> {
        self.get(variable.as_str())
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.bindings.contains_key(variable)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterate over `(name, term)` pairs in binding order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.bindings.iter().map(|(name, term)| (name.as_str(), term))
    }

    /// Bound variable names in binding order
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// A copy of this solution with one more binding
    pub fn with(&self, variable: &Variable, term: Term) -> Option<Self> {
        let mut extended = self.clone();
        extended.bind(variable.as_str(), term).then_some(extended)
    }

    /// Bind in place; false if the variable already holds a different term
    pub(crate) fn bind(&mut self, variable: &str, term: Term) -> bool {
        match self.bindings.get(variable) {
            Some(existing) => *existing == term,
            None => {
                self.bindings.insert(variable.to_string(), term);
                true
            }
        }
    }

    /// Shared variables agree
    pub fn is_compatible(&self, other: &QuerySolution) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .bindings
            .iter()
            .all(|(name, term)| large.get(name).map_or(true, |t| t == term))
    }

    /// Union of two compatible solutions
    pub fn merge(&self, other: &QuerySolution) -> Option<Self> {
        if !self.is_compatible(other) {
            return None;
        }
        let mut merged = self.clone();
        for (name, term) in &other.bindings {
            if !merged.bindings.contains_key(name) {
                merged.bindings.insert(name.clone(), term.clone());
            }
        }
        Some(merged)
    }

    /// Restrict to the given variables, in the given order
    pub fn project(&self, variables: &[Variable]) -> Self {
        let bindings = variables
            .iter()
            .filter_map(|v| {
                self.bindings
                    .get(v.as_str())
                    .map(|term| (v.as_str().to_string(), term.clone()))
            })
            .collect();
        Self { bindings }
    }
}

impl fmt::Display for QuerySolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "?{}={}", name, term)?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(Variable, Term)> for QuerySolution {
    fn from_iter<I: IntoIterator<Item = (Variable, Term)>>(iter: I) -> Self {
        let mut solution = QuerySolution::new();
        for (variable, term) in iter {
            solution.bindings.insert(variable.as_str().to_string(), term);
        }
        solution
    }
}

/// Variables bound in every solution of a sequence
pub fn certain_variables(solutions: &[QuerySolution]) -> FxHashSet<String> {
    let mut iter = solutions.iter();
    let Some(first) = iter.next() else {
        return FxHashSet::default();
    };
    let mut certain: FxHashSet<String> = first.variables().map(str::to_string).collect();
    for solution in iter {
        certain.retain(|name| solution.contains(name));
    }
    certain
}

/// Hash join of two solution sequences
///
/// The build side is bucketed by the variables that are bound in every
/// solution of both inputs; each probe then checks full compatibility, which
/// also covers variables bound on only some solutions. With no such key all
/// build solutions share one bucket and the join degrades to a nested loop.
#[derive(Debug)]
pub struct HashJoin {
    keys: Vec<String>,
    build: Vec<QuerySolution>,
    buckets: FxHashMap<Vec<Term>, Vec<usize>>,
}

impl HashJoin {
    /// Bucket `build`, keyed on variables certain in both `probe` and `build`
    pub fn new(probe: &[QuerySolution], build: Vec<QuerySolution>) -> Self {
        let probe_vars = certain_variables(probe);
        let build_vars = certain_variables(&build);
        let mut keys: Vec<String> = probe_vars.intersection(&build_vars).cloned().collect();
        keys.sort();

        let mut buckets: FxHashMap<Vec<Term>, Vec<usize>> = FxHashMap::default();
        for (i, solution) in build.iter().enumerate() {
            let key = join_key(&keys, solution);
            buckets.entry(key).or_default().push(i);
        }

        Self { keys, build, buckets }
    }

    /// Variables the buckets are keyed on
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Merged solutions for one probe-side solution
    pub fn probe<'a>(&'a self, solution: &'a QuerySolution) -> impl Iterator<Item = QuerySolution> + 'a {
        let key = join_key(&self.keys, solution);
        self.buckets
            .get(&key)
            .into_iter()
            .flatten()
            .filter_map(move |&i| solution.merge(&self.build[i]))
    }
}

fn join_key(keys: &[String], solution: &QuerySolution) -> Vec<Term> {
    keys.iter()
        .filter_map(|name| solution.get(name).cloned())
        .collect()
}

/// Join two solution sequences on their shared variables
pub fn join(left: Vec<QuerySolution>, right: Vec<QuerySolution>) -> Vec<QuerySolution> {
    let hash_join = HashJoin::new(&left, right);
    left.iter().flat_map(|l| hash_join.probe(l)).collect()
}

/// Concatenate two solution sequences
pub fn union(mut left: Vec<QuerySolution>, right: Vec<QuerySolution>) -> Vec<QuerySolution> {
    left.extend(right);
    left
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Variable {
        Variable::new(name).unwrap()
    }

    fn iri(s: &str) -> Term {
        Term::iri(format!("http://example.org/{}", s)).unwrap()
    }

    fn solution(pairs: &[(&str, &str)]) -> QuerySolution {
        pairs.iter().map(|(v, t)| (var(v), iri(t))).collect()
    }

    #[test]
    fn test_with_rejects_conflict() {
        let s = QuerySolution::new().with(&var("x"), iri("a")).unwrap();
        assert!(s.with(&var("x"), iri("a")).is_some());
        assert!(s.with(&var("x"), iri("b")).is_none());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_merge_and_compatibility() {
        let a = solution(&[("x", "a"), ("y", "b")]);
        let b = solution(&[("y", "b"), ("z", "c")]);
        let c = solution(&[("y", "other")]);

        assert!(a.is_compatible(&b));
        assert!(!a.is_compatible(&c));
        assert_eq!(a.merge(&b).unwrap().len(), 3);
        assert!(a.merge(&c).is_none());
    }

    #[test]
    fn test_project() {
        let s = solution(&[("x", "a"), ("y", "b")]);
        let projected = s.project(&[var("y"), var("missing")]);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.get("y"), Some(&iri("b")));
    }

    #[test]
    fn test_join_on_shared_variable() {
        let left = vec![solution(&[("x", "a"), ("y", "b")]), solution(&[("x", "d"), ("y", "e")])];
        let right = vec![solution(&[("y", "b"), ("z", "c")])];

        let joined = join(left, right);
        assert_eq!(joined, vec![solution(&[("x", "a"), ("y", "b"), ("z", "c")])]);
    }

    #[test]
    fn test_join_without_shared_variables_is_cross_product() {
        let left = vec![solution(&[("x", "a")]), solution(&[("x", "b")])];
        let right = vec![solution(&[("y", "c")]), solution(&[("y", "d")])];

        let hash_join = HashJoin::new(&left, right.clone());
        assert!(hash_join.keys().is_empty());
        assert_eq!(join(left, right).len(), 4);
    }

    #[test]
    fn test_join_checks_partially_bound_variables() {
        // ?z is bound on only one left solution, so it is not a bucket key
        let left = vec![solution(&[("x", "a"), ("z", "c")]), solution(&[("x", "a")])];
        let right = vec![solution(&[("x", "a"), ("z", "other")])];

        let joined = join(left, right);
        assert_eq!(joined, vec![solution(&[("x", "a"), ("z", "other")])]);
    }

    #[test]
    fn test_union() {
        let out = union(vec![solution(&[("x", "a")])], vec![solution(&[("y", "b")])]);
        assert_eq!(out.len(), 2);
    }
}
