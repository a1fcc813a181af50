//! RDF data model and indexed triple store
//!
//! This module implements the storage half of the engine:
//! - Terms (IRIs, literals, blank nodes, query variables)
//! - Triples and triple patterns
//! - The indexed graph with SPO / POS / OSP access paths
//! - Prefix expansion for compact IRIs
//!
//! # Example
//!
//! ```rust
//! use notegraph::rdf::{IndexedGraph, NamespaceManager, Term, Triple};
//!
//! let ns = NamespaceManager::new();
//! let mut graph = IndexedGraph::new();
//!
//! let task = ns.term("note:write-report").unwrap();
//! let triple = Triple::new(task.clone(), ns.term("rdf:type").unwrap(), ns.term("note:Task").unwrap());
//! graph.add(triple).unwrap();
//!
//! let results: Vec<Triple> = graph.match_pattern(Some(&task), None, None).into_iter().collect();
//! assert_eq!(results.len(), 1);
//! ```

mod namespace;
mod store;
mod types;

pub use types::{
    BlankNode, Literal, NamedNode, Position, RdfError, RdfResult, Term, Triple, TriplePattern,
    TripleViolation, Variable,
};

pub use store::{
    AccessPath, AddOutcome, BatchOutcome, IndexedGraph, MatchIter, Matches, RdfStoreError,
    RdfStoreResult, validate_triple,
};

pub use namespace::{NamespaceManager, PrefixError, PrefixResult};
