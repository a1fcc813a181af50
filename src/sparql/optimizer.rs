//! Join ordering for basic graph patterns
//!
//! A static heuristic, not a cost model: patterns with more ground positions
//! run first, and once a pattern is placed its variables count as ground for
//! the patterns after it. Ties keep query order.

use crate::rdf::{TriplePattern, Variable};
use rustc_hash::FxHashSet;

/// Order the patterns of a BGP for index nested-loop evaluation
pub fn order_patterns(patterns: &[TriplePattern]) -> Vec<&TriplePattern> {
    let mut remaining: Vec<&TriplePattern> = patterns.iter().collect();
    let mut ordered = Vec::with_capacity(patterns.len());
    let mut bound: FxHashSet<&Variable> = FxHashSet::default();

    while !remaining.is_empty() {
        let mut best = 0;
        let mut best_score = 0;
        for (i, pattern) in remaining.iter().enumerate() {
            let score = bound_positions(pattern, &bound);
            if i == 0 || score > best_score {
                best = i;
                best_score = score;
            }
        }
        let chosen = remaining.remove(best);
        bound.extend(chosen.variables());
        ordered.push(chosen);
    }

    ordered
}

/// Positions that will be ground when the pattern runs
fn bound_positions(pattern: &TriplePattern, bound: &FxHashSet<&Variable>) -> usize {
    pattern
        .positions()
        .iter()
        .filter(|(_, term)| term.as_variable().map_or(true, |v| bound.contains(v)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::Term;

    fn var(name: &str) -> Term {
        Term::variable(name).unwrap()
    }

    fn iri(s: &str) -> Term {
        Term::iri(format!("http://example.org/{}", s)).unwrap()
    }

    #[test]
    fn test_more_ground_positions_first() {
        let loose = TriplePattern::new(var("s"), var("p"), var("o"));
        let tight = TriplePattern::new(var("s"), iri("type"), iri("Task"));
        let patterns = vec![loose.clone(), tight.clone()];

        let ordered = order_patterns(&patterns);
        assert_eq!(ordered, vec![&tight, &loose]);
    }

    #[test]
    fn test_bound_variables_count_as_ground() {
        let anchor = TriplePattern::new(var("x"), iri("type"), iri("Task"));
        let unrelated = TriplePattern::new(var("a"), iri("tag"), var("b"));
        let connected = TriplePattern::new(var("x"), iri("status"), var("st"));
        let patterns = vec![anchor.clone(), unrelated.clone(), connected.clone()];

        let ordered = order_patterns(&patterns);
        assert_eq!(ordered, vec![&anchor, &connected, &unrelated]);
    }

    #[test]
    fn test_ties_keep_query_order() {
        let first = TriplePattern::new(var("a"), iri("p"), var("b"));
        let second = TriplePattern::new(var("c"), iri("q"), var("d"));
        let patterns = vec![first.clone(), second.clone()];

        assert_eq!(order_patterns(&patterns), vec![&first, &second]);
    }
}
