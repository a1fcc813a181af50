//! SPARQL algebra evaluation
//!
//! This module evaluates query algebra trees against an [`IndexedGraph`]
//! snapshot. Parsing query text is left to the caller; the executor takes the
//! resulting [`Algebra`].
//!
//! Evaluated operators: basic graph patterns, joins, filters, projection and
//! CONSTRUCT at the root. Other operators are rejected up front with
//! [`SparqlError::UnsupportedOperation`].
//!
//! # Example
//!
//! ```rust
//! use notegraph::rdf::{IndexedGraph, Term, Triple, TriplePattern};
//! use notegraph::sparql::{Algebra, SparqlExecutor};
//! use std::sync::Arc;
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     let task = Term::iri("http://example.org/Task").unwrap();
//!     let rdf_type = Term::iri("http://www.w3.org/1999/02/22-rdf-syntax-ns#type").unwrap();
//!     let note = Term::iri("http://example.org/A").unwrap();
//!
//!     let mut graph = IndexedGraph::new();
//!     graph.add(Triple::new(note, rdf_type.clone(), task.clone())).unwrap();
//!
//!     let executor = SparqlExecutor::new(Arc::new(graph));
//!     let query = Algebra::bgp(vec![TriplePattern::new(Term::variable("s").unwrap(), rdf_type, task)]);
//!     let results = executor.execute(&query).await.unwrap();
//!     assert_eq!(results.len(), 1);
//! });
//! ```
//!
//! [`IndexedGraph`]: crate::rdf::IndexedGraph

mod algebra;
mod binding;
mod executor;
mod expression;
mod matcher;
mod optimizer;
mod results;

pub use algebra::Algebra;
pub use binding::{certain_variables, join, union, HashJoin, QuerySolution};
pub use executor::{ExecutorConfig, SparqlExecutor};
pub use expression::{EvaluationError, EvaluationResult, Expression};
pub use matcher::{ground, PatternMatcher};
pub use optimizer::order_patterns;
pub use results::SparqlResults;

use crate::rdf::RdfStoreError;
use crate::source::SourceError;
use thiserror::Error;

/// SPARQL errors
#[derive(Error, Debug)]
pub enum SparqlError {
    /// No graph has been loaded, or it was disposed
    #[error("Store not initialized")]
    StoreNotInitialized,

    /// A triple was rejected by the store
    #[error(transparent)]
    InvalidTriple(#[from] RdfStoreError),

    /// Algebra node the executor does not evaluate
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Filter evaluation error (strict filter mode only)
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    /// Structurally invalid algebra tree
    #[error("Malformed algebra: {0}")]
    MalformedAlgebra(String),

    /// Triple source failure
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

pub type SparqlResult<T> = Result<T, SparqlError>;
