//! Indexed triple store
//!
//! This module provides an in-memory triple set with three access-path indexes.

use super::types::{Position, Term, Triple};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxBuildHasher;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;
type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

/// Two-level index: first key -> second key -> set of third terms
type TermIndex = FxIndexMap<Term, FxIndexMap<Term, FxIndexSet<Term>>>;

/// Store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RdfStoreError {
    /// Non-ground or malformed triple
    #[error("Invalid triple {triple}: {position} {reason}")]
    InvalidTriple {
        triple: String,
        position: Position,
        reason: &'static str,
    },
}

pub type RdfStoreResult<T> = Result<T, RdfStoreError>;

/// Check that a triple can be stored
pub fn validate_triple(triple: &Triple) -> RdfStoreResult<()> {
    triple.validate().map_err(|violation| RdfStoreError::InvalidTriple {
        triple: triple.to_string(),
        position: violation.position,
        reason: violation.reason,
    })
}

/// Result of a single insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Triple was not present before
    Inserted,
    /// Equal triple already stored; nothing changed
    AlreadyPresent,
}

impl AddOutcome {
    pub fn is_inserted(self) -> bool {
        self == AddOutcome::Inserted
    }
}

/// Result of a batch insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Triples that were new
    pub inserted: usize,
    /// Triples that were already present (or repeated within the batch)
    pub duplicates: usize,
}

/// Index chosen to answer a pattern lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPath {
    /// All three positions bound: membership check
    Exact,
    /// SPO index, first two levels
    SubjectPredicate,
    /// POS index, first two levels
    PredicateObject,
    /// OSP index, first two levels
    ObjectSubject,
    /// SPO index, first level
    Subject,
    /// POS index, first level
    Predicate,
    /// OSP index, first level
    Object,
    /// Nothing bound: scan the canonical set
    FullScan,
}

impl AccessPath {
    /// Pick the index whose leading keys are exactly the bound positions
    pub fn select(subject: bool, predicate: bool, object: bool) -> Self {
        match (subject, predicate, object) {
            (true, true, true) => AccessPath::Exact,
            (true, true, false) => AccessPath::SubjectPredicate,
            (false, true, true) => AccessPath::PredicateObject,
            (true, false, true) => AccessPath::ObjectSubject,
            (true, false, false) => AccessPath::Subject,
            (false, true, false) => AccessPath::Predicate,
            (false, false, true) => AccessPath::Object,
            (false, false, false) => AccessPath::FullScan,
        }
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessPath::Exact => "exact",
            AccessPath::SubjectPredicate => "spo[s][p]",
            AccessPath::PredicateObject => "pos[p][o]",
            AccessPath::ObjectSubject => "osp[o][s]",
            AccessPath::Subject => "spo[s]",
            AccessPath::Predicate => "pos[p]",
            AccessPath::Object => "osp[o]",
            AccessPath::FullScan => "scan",
        };
        f.write_str(name)
    }
}

/// Iterator over matching triples
pub type MatchIter<'a> = Box<dyn Iterator<Item = Triple> + Send + 'a>;

/// Lazy, restartable result of [`IndexedGraph::match_pattern`]
///
/// Each call to [`Matches::iter`] walks the graph from the start.
#[derive(Debug, Clone)]
pub struct Matches<'a> {
    graph: &'a IndexedGraph,
    access: AccessPath,
    subject: Option<Term>,
    predicate: Option<Term>,
    object: Option<Term>,
}

impl<'a> Matches<'a> {
    /// Index used to answer the lookup
    pub fn access_path(&self) -> AccessPath {
        self.access
    }

    /// Start a fresh scan
    pub fn iter(&self) -> MatchIter<'a> {
        let graph = self.graph;
        match (
            self.access,
            self.subject.clone(),
            self.predicate.clone(),
            self.object.clone(),
        ) {
            (AccessPath::Exact, Some(s), Some(p), Some(o)) => {
                let triple = Triple::new(s, p, o);
                let found = graph.has(&triple).then_some(triple);
                Box::new(found.into_iter())
            }
            (AccessPath::SubjectPredicate, Some(s), Some(p), _) => {
                let objects = graph.spo.get(&s).and_then(|m| m.get(&p));
                Box::new(
                    objects
                        .into_iter()
                        .flatten()
                        .map(move |o| Triple::new(s.clone(), p.clone(), o.clone())),
                )
            }
            (AccessPath::PredicateObject, _, Some(p), Some(o)) => {
                let subjects = graph.pos.get(&p).and_then(|m| m.get(&o));
                Box::new(
                    subjects
                        .into_iter()
                        .flatten()
                        .map(move |s| Triple::new(s.clone(), p.clone(), o.clone())),
                )
            }
            (AccessPath::ObjectSubject, Some(s), _, Some(o)) => {
                let predicates = graph.osp.get(&o).and_then(|m| m.get(&s));
                Box::new(
                    predicates
                        .into_iter()
                        .flatten()
                        .map(move |p| Triple::new(s.clone(), p.clone(), o.clone())),
                )
            }
            (AccessPath::Subject, Some(s), _, _) => {
                Box::new(graph.spo.get(&s).into_iter().flatten().flat_map(move |(p, objects)| {
                    let s = s.clone();
                    objects
                        .iter()
                        .map(move |o| Triple::new(s.clone(), p.clone(), o.clone()))
                }))
            }
            (AccessPath::Predicate, _, Some(p), _) => {
                Box::new(graph.pos.get(&p).into_iter().flatten().flat_map(move |(o, subjects)| {
                    let p = p.clone();
                    subjects
                        .iter()
                        .map(move |s| Triple::new(s.clone(), p.clone(), o.clone()))
                }))
            }
            (AccessPath::Object, _, _, Some(o)) => {
                Box::new(graph.osp.get(&o).into_iter().flatten().flat_map(move |(s, predicates)| {
                    let o = o.clone();
                    predicates
                        .iter()
                        .map(move |p| Triple::new(s.clone(), p.clone(), o.clone()))
                }))
            }
            _ => Box::new(graph.triples.iter().cloned()),
        }
    }

    /// Count matches without materializing them
    pub fn count(&self) -> usize {
        self.iter().count()
    }
}

impl<'a> IntoIterator for Matches<'a> {
    type Item = Triple;
    type IntoIter = MatchIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &Matches<'a> {
    type Item = Triple;
    type IntoIter = MatchIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Triple store with multiple indices for efficient pattern lookups
///
/// Implements:
/// - SPO index (Subject -> Predicate -> Objects)
/// - POS index (Predicate -> Object -> Subjects)
/// - OSP index (Object -> Subject -> Predicates)
///
/// Every pattern with one or two bound positions is answered by the index
/// whose leading keys are exactly those positions. All mutations go through
/// `&mut self` and finish updating the canonical set and all three indexes
/// before returning.
#[derive(Debug, Clone, Default)]
pub struct IndexedGraph {
    /// All triples (primary storage)
    triples: FxIndexSet<Triple>,

    /// SPO index: Subject -> Predicate -> Set of Objects
    spo: TermIndex,

    /// POS index: Predicate -> Object -> Set of Subjects
    pos: TermIndex,

    /// OSP index: Object -> Subject -> Set of Predicates
    osp: TermIndex,
}

impl IndexedGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple
    pub fn add(&mut self, triple: Triple) -> RdfStoreResult<AddOutcome> {
        validate_triple(&triple)?;
        Ok(self.insert_valid(triple))
    }

    /// Insert many triples
    ///
    /// The whole batch is validated first, so an invalid triple leaves the
    /// graph untouched.
    pub fn add_batch<I>(&mut self, triples: I) -> RdfStoreResult<BatchOutcome>
    where
        I: IntoIterator<Item = Triple>,
    {
        let triples: Vec<Triple> = triples.into_iter().collect();
        for triple in &triples {
            validate_triple(triple)?;
        }

        self.triples.reserve(triples.len());
        let mut outcome = BatchOutcome::default();
        for triple in triples {
            match self.insert_valid(triple) {
                AddOutcome::Inserted => outcome.inserted += 1,
                AddOutcome::AlreadyPresent => outcome.duplicates += 1,
            }
        }

        debug!(
            inserted = outcome.inserted,
            duplicates = outcome.duplicates,
            total = self.triples.len(),
            "batch insert complete"
        );
        Ok(outcome)
    }

    /// Remove a triple; returns whether it was present
    pub fn remove(&mut self, triple: &Triple) -> RdfStoreResult<bool> {
        validate_triple(triple)?;
        if !self.triples.swap_remove(triple) {
            return Ok(false);
        }

        let (s, p, o) = (&triple.subject, &triple.predicate, &triple.object);
        index_remove(&mut self.spo, s, p, o);
        index_remove(&mut self.pos, p, o, s);
        index_remove(&mut self.osp, o, s, p);
        Ok(true)
    }

    /// Check if a triple exists, through the SPO index
    pub fn has(&self, triple: &Triple) -> bool {
        self.spo
            .get(&triple.subject)
            .and_then(|predicates| predicates.get(&triple.predicate))
            .is_some_and(|objects| objects.contains(&triple.object))
    }

    /// Look up triples by any combination of bound positions (`None` = wildcard)
    pub fn match_pattern(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
    ) -> Matches<'_> {
        let access = AccessPath::select(subject.is_some(), predicate.is_some(), object.is_some());
        trace!(%access, "selected access path");
        Matches {
            graph: self,
            access,
            subject: subject.cloned(),
            predicate: predicate.cloned(),
            object: object.cloned(),
        }
    }

    /// Get the total number of triples
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Clear all triples and indexes
    pub fn clear(&mut self) {
        self.triples.clear();
        self.spo.clear();
        self.pos.clear();
        self.osp.clear();
    }

    /// Iterate over all triples
    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Distinct subjects
    pub fn subjects(&self) -> Vec<Term> {
        self.spo.keys().cloned().collect()
    }

    /// Distinct predicates
    pub fn predicates(&self) -> Vec<Term> {
        self.pos.keys().cloned().collect()
    }

    /// Distinct objects
    pub fn objects(&self) -> Vec<Term> {
        self.osp.keys().cloned().collect()
    }

    /// Verify that the three indexes describe exactly the canonical set
    pub fn is_consistent(&self) -> bool {
        let indexed = |index: &TermIndex| -> usize {
            index
                .values()
                .flat_map(|second| second.values())
                .map(|third| third.len())
                .sum()
        };
        let sizes_agree = indexed(&self.spo) == self.triples.len()
            && indexed(&self.pos) == self.triples.len()
            && indexed(&self.osp) == self.triples.len();

        sizes_agree
            && self.triples.iter().all(|t| {
                let (s, p, o) = (&t.subject, &t.predicate, &t.object);
                index_contains(&self.spo, s, p, o)
                    && index_contains(&self.pos, p, o, s)
                    && index_contains(&self.osp, o, s, p)
            })
    }

    fn insert_valid(&mut self, triple: Triple) -> AddOutcome {
        if self.triples.contains(&triple) {
            return AddOutcome::AlreadyPresent;
        }

        let (s, p, o) = (&triple.subject, &triple.predicate, &triple.object);
        index_insert(&mut self.spo, s, p, o);
        index_insert(&mut self.pos, p, o, s);
        index_insert(&mut self.osp, o, s, p);
        self.triples.insert(triple);
        AddOutcome::Inserted
    }
}

fn index_insert(index: &mut TermIndex, a: &Term, b: &Term, c: &Term) {
    index
        .entry(a.clone())
        .or_default()
        .entry(b.clone())
        .or_default()
        .insert(c.clone());
}

fn index_remove(index: &mut TermIndex, a: &Term, b: &Term, c: &Term) {
    if let Some(second) = index.get_mut(a) {
        if let Some(third) = second.get_mut(b) {
            third.swap_remove(c);
            if third.is_empty() {
                second.swap_remove(b);
            }
        }
        if second.is_empty() {
            index.swap_remove(a);
        }
    }
}

fn index_contains(index: &TermIndex, a: &Term, b: &Term, c: &Term) -> bool {
    index
        .get(a)
        .and_then(|second| second.get(b))
        .is_some_and(|third| third.contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> Term {
        Term::iri(format!("http://example.org/{}", s)).unwrap()
    }

    fn create_test_triple() -> Triple {
        Triple::new(iri("alice"), iri("name"), Term::literal("Alice"))
    }

    #[test]
    fn test_add_and_has() {
        let mut graph = IndexedGraph::new();
        let triple = create_test_triple();

        assert_eq!(graph.add(triple.clone()).unwrap(), AddOutcome::Inserted);
        assert_eq!(graph.len(), 1);
        assert!(graph.has(&triple));
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let mut graph = IndexedGraph::new();
        let triple = create_test_triple();

        graph.add(triple.clone()).unwrap();
        assert_eq!(graph.add(triple).unwrap(), AddOutcome::AlreadyPresent);
        assert_eq!(graph.len(), 1);
        assert!(graph.is_consistent());
    }

    #[test]
    fn test_invalid_triple_rejected() {
        let mut graph = IndexedGraph::new();
        let triple = Triple::new(Term::variable("s").unwrap(), iri("p"), iri("o"));

        let err = graph.add(triple).unwrap_err();
        assert!(matches!(
            err,
            RdfStoreError::InvalidTriple { position: Position::Subject, .. }
        ));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut graph = IndexedGraph::new();
        let triple = create_test_triple();

        graph.add(triple.clone()).unwrap();
        assert!(graph.remove(&triple).unwrap());
        assert!(!graph.remove(&triple).unwrap());
        assert!(graph.is_empty());
        assert!(!graph.has(&triple));
        assert!(graph.subjects().is_empty());
        assert!(graph.is_consistent());
    }

    #[test]
    fn test_access_path_selection() {
        let graph = IndexedGraph::new();
        let (s, p, o) = (iri("s"), iri("p"), iri("o"));

        let path = |s: Option<&Term>, p: Option<&Term>, o: Option<&Term>| {
            graph.match_pattern(s, p, o).access_path()
        };
        assert_eq!(path(None, None, None), AccessPath::FullScan);
        assert_eq!(path(Some(&s), None, None), AccessPath::Subject);
        assert_eq!(path(None, Some(&p), None), AccessPath::Predicate);
        assert_eq!(path(None, None, Some(&o)), AccessPath::Object);
        assert_eq!(path(Some(&s), Some(&p), None), AccessPath::SubjectPredicate);
        assert_eq!(path(None, Some(&p), Some(&o)), AccessPath::PredicateObject);
        assert_eq!(path(Some(&s), None, Some(&o)), AccessPath::ObjectSubject);
        assert_eq!(path(Some(&s), Some(&p), Some(&o)), AccessPath::Exact);
    }

    #[test]
    fn test_matches_are_restartable() {
        let mut graph = IndexedGraph::new();
        graph.add(Triple::new(iri("a"), iri("p"), iri("b"))).unwrap();
        graph.add(Triple::new(iri("a"), iri("p"), iri("c"))).unwrap();

        let subject = iri("a");
        let matches = graph.match_pattern(Some(&subject), None, None);
        assert_eq!(matches.iter().count(), 2);
        assert_eq!(matches.iter().count(), 2);
    }

    #[test]
    fn test_add_batch_is_all_or_nothing() {
        let mut graph = IndexedGraph::new();
        let good = create_test_triple();
        let bad = Triple::new(iri("a"), Term::literal("not a predicate"), iri("b"));

        assert!(graph.add_batch(vec![good.clone(), bad]).is_err());
        assert!(graph.is_empty());

        let outcome = graph
            .add_batch(vec![good.clone(), good, Triple::new(iri("a"), iri("p"), iri("b"))])
            .unwrap();
        assert_eq!(outcome, BatchOutcome { inserted: 2, duplicates: 1 });
        assert!(graph.is_consistent());
    }

    #[test]
    fn test_subjects_predicates_objects() {
        let mut graph = IndexedGraph::new();
        graph.add(Triple::new(iri("alice"), iri("name"), Term::literal("Alice"))).unwrap();
        graph.add(Triple::new(iri("bob"), iri("name"), Term::literal("Bob"))).unwrap();

        assert_eq!(graph.subjects().len(), 2);
        assert_eq!(graph.predicates().len(), 1);
        assert_eq!(graph.objects().len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut graph = IndexedGraph::new();
        graph.add(create_test_triple()).unwrap();

        graph.clear();
        assert!(graph.is_empty());
        assert!(graph.predicates().is_empty());
        assert!(graph.is_consistent());
    }
}
