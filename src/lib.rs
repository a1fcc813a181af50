//! Notegraph
//!
//! An in-process triple store and SPARQL algebra executor for a notes vault.
//! Triples extracted from notes are held in an indexed graph and queried by
//! evaluating algebra trees produced by a SPARQL parser.
//!
//! # Components
//!
//! - [`rdf`]: terms, triples and the SPO / POS / OSP indexed graph
//! - [`sparql`]: pattern matching, joins, filters, projection and CONSTRUCT
//! - [`source`]: the triple source the graph is built from
//! - [`service`]: the query service that owns the graph lifecycle
//!
//! ## Example Usage
//!
//! ```rust
//! use notegraph::{Algebra, MemoryTripleSource, QueryService, QueryServiceConfig};
//! use notegraph::rdf::{NamespaceManager, Term, Triple, TriplePattern};
//! use std::sync::Arc;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let ns = NamespaceManager::new();
//! let source = Arc::new(MemoryTripleSource::new());
//! source
//!     .insert_document(
//!         "tasks.md",
//!         vec![Triple::new(
//!             ns.term("note:write-report").unwrap(),
//!             ns.term("rdf:type").unwrap(),
//!             ns.term("note:Task").unwrap(),
//!         )],
//!     )
//!     .await;
//!
//! let service = QueryService::new(source, QueryServiceConfig::default());
//! service.load().await.unwrap();
//!
//! let tasks = Algebra::bgp(vec![TriplePattern::new(
//!     Term::variable("task").unwrap(),
//!     ns.term("rdf:type").unwrap(),
//!     ns.term("note:Task").unwrap(),
//! )]);
//! let results = service.query(&tasks).await.unwrap();
//! assert_eq!(results.len(), 1);
//! # });
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod rdf;
pub mod service;
pub mod source;
pub mod sparql;

// Re-export main types for convenience
pub use rdf::{
    AccessPath, IndexedGraph, NamespaceManager, RdfStoreError, RdfStoreResult, Term, Triple,
    TriplePattern, Variable,
};

pub use sparql::{
    Algebra, EvaluationError, ExecutorConfig, Expression, QuerySolution, SparqlError,
    SparqlExecutor, SparqlResult, SparqlResults,
};

pub use source::{DocumentId, MemoryTripleSource, SourceError, TripleSource};

pub use service::{DocumentChange, GraphStats, LoadReport, QueryService, QueryServiceConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
