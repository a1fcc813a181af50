//! Triple sources
//!
//! The query service does not extract triples itself. A [`TripleSource`]
//! enumerates documents (notes) and yields the triples extracted from each.

use crate::rdf::Triple;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::RwLock;

/// Identifier of a source document (typically a note path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Source errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Document is not (or no longer) known to the source
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Document exists but could not be read or extracted
    #[error("Failed to read {document}: {message}")]
    Read { document: String, message: String },
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Provider of extracted triples, one batch per document
#[async_trait]
pub trait TripleSource: Send + Sync {
    /// All documents currently available
    async fn document_ids(&self) -> SourceResult<Vec<DocumentId>>;

    /// Triples extracted from one document
    async fn triples_for(&self, document: &DocumentId) -> SourceResult<Vec<Triple>>;
}

/// In-memory triple source
#[derive(Debug, Default)]
pub struct MemoryTripleSource {
    documents: RwLock<FxHashMap<DocumentId, Vec<Triple>>>,
}

impl MemoryTripleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document's triples
    pub async fn insert_document(&self, document: impl Into<DocumentId>, triples: Vec<Triple>) {
        self.documents.write().await.insert(document.into(), triples);
    }

    /// Forget a document; returns whether it existed
    pub async fn remove_document(&self, document: &DocumentId) -> bool {
        self.documents.write().await.remove(document).is_some()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl TripleSource for MemoryTripleSource {
    async fn document_ids(&self) -> SourceResult<Vec<DocumentId>> {
        let mut ids: Vec<DocumentId> = self.documents.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn triples_for(&self, document: &DocumentId) -> SourceResult<Vec<Triple>> {
        self.documents
            .read()
            .await
            .get(document)
            .cloned()
            .ok_or_else(|| SourceError::DocumentNotFound(document.to_string()))
    }
}
