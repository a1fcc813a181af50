//! Pattern matcher over the indexed graph
//!
//! Bridges triple patterns and the graph's access paths. Variables are
//! wildcards here; grounding them from a solution and binding the results
//! back is how the executor runs its index nested-loop join.

use super::binding::QuerySolution;
use crate::rdf::{AccessPath, IndexedGraph, MatchIter, Matches, Term, Triple, TriplePattern};

/// Pattern lookups against one graph
///
/// Only variables are wildcards. A blank node in a pattern is a ground term
/// and matches that exact blank node in the graph; a query front end that
/// wants SPARQL's blank-node-as-variable reading must rewrite such nodes
/// into fresh variables before building the algebra.
#[derive(Debug, Clone, Copy)]
pub struct PatternMatcher<'g> {
    graph: &'g IndexedGraph,
}

impl<'g> PatternMatcher<'g> {
    pub fn new(graph: &'g IndexedGraph) -> Self {
        Self { graph }
    }

    /// Triples matching the ground positions of `pattern`
    pub fn matches(&self, pattern: &TriplePattern) -> Matches<'g> {
        self.graph.match_pattern(
            pattern.subject.as_ground(),
            pattern.predicate.as_ground(),
            pattern.object.as_ground(),
        )
    }

    /// Index that would answer `pattern`
    pub fn access_path(&self, pattern: &TriplePattern) -> AccessPath {
        AccessPath::select(
            !pattern.subject.is_variable(),
            !pattern.predicate.is_variable(),
            !pattern.object.is_variable(),
        )
    }

    /// Extend `solution` with every triple matching `pattern`
    ///
    /// Variables already bound in `solution` are substituted first so the
    /// lookup uses the most selective index. A triple that would bind one
    /// variable to two terms (e.g. `?x :p ?x`) is skipped.
    pub fn extend<'a>(
        &self,
        pattern: &TriplePattern,
        solution: &'a QuerySolution,
    ) -> impl Iterator<Item = QuerySolution> + 'a
    where
        'g: 'a,
    {
        let grounded = ground(pattern, solution);
        let triples: MatchIter<'a> = self.matches(&grounded).into_iter();
        triples.filter_map(move |triple| bind_triple(&grounded, &triple, solution))
    }
}

/// Substitute bound variables of `pattern` with their terms
pub fn ground(pattern: &TriplePattern, solution: &QuerySolution) -> TriplePattern {
    let substitute = |term: &Term| match term {
        Term::Variable(v) => solution.value(v).cloned().unwrap_or_else(|| term.clone()),
        other => other.clone(),
    };
    TriplePattern {
        subject: substitute(&pattern.subject),
        predicate: substitute(&pattern.predicate),
        object: substitute(&pattern.object),
    }
}

fn bind_triple(pattern: &TriplePattern, triple: &Triple, solution: &QuerySolution) -> Option<QuerySolution> {
    let mut extended = solution.clone();
    for (position, term) in pattern.positions() {
        if let Term::Variable(v) = term {
            if !extended.bind(v.as_str(), triple.get(position).clone()) {
                return None;
            }
        }
    }
    Some(extended)
}
