//! Query service
//!
//! Owns the graph for one vault. The graph is built from a [`TripleSource`],
//! queried through [`SparqlExecutor`], and kept current either by full
//! rebuilds or by per-document updates.
//!
//! Queries run against an `Arc` snapshot taken under a short read lock, so a
//! rebuild or update that lands while a query is running never changes what
//! that query sees. Updates go through `Arc::make_mut`, which copies the graph
//! only when a snapshot is still held.
//!
//! A rebuild reads the source without holding the lock. Per-document updates
//! that commit meanwhile are carried into its result when it is swapped in.

use crate::rdf::{validate_triple, IndexedGraph, Triple};
use crate::source::{DocumentId, SourceError, TripleSource};
use crate::sparql::{Algebra, ExecutorConfig, SparqlError, SparqlExecutor, SparqlResult, SparqlResults};
use indexmap::IndexSet;
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

/// Query service configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryServiceConfig {
    /// Executor settings applied to every query
    pub executor: ExecutorConfig,
}

impl QueryServiceConfig {
    /// Parse from the host's JSON settings; missing fields take defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Outcome of a full build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Documents read from the source
    pub documents: usize,
    /// Distinct triples in the new graph
    pub triples: usize,
    /// Extracted triples that were already present
    pub duplicates: usize,
    pub elapsed: Duration,
    /// Per-document updates that landed during the build and were carried over
    pub replayed: usize,
    /// A later rebuild or a dispose started meanwhile; the result was discarded
    pub superseded: bool,
}

/// Net effect of a per-document update on the graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocumentChange {
    /// Triples that entered the graph
    pub added: usize,
    /// Triples that left the graph
    pub removed: usize,
}

/// Graph statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub triples: usize,
    pub subjects: usize,
    pub predicates: usize,
    pub objects: usize,
    pub documents: usize,
    pub epoch: u64,
}

/// Which documents contributed which triples
///
/// A triple stays in the graph while at least one document contributes it.
#[derive(Debug, Clone, Default)]
struct DocumentLedger {
    documents: FxHashMap<DocumentId, FxIndexSet<Triple>>,
    refcounts: FxHashMap<Triple, usize>,
}

/// Triples whose graph membership changed
#[derive(Debug, Default)]
struct LedgerDelta {
    added: Vec<Triple>,
    removed: Vec<Triple>,
}

impl DocumentLedger {
    fn len(&self) -> usize {
        self.documents.len()
    }

    fn triples_of(&self, document: &DocumentId) -> Option<&FxIndexSet<Triple>> {
        self.documents.get(document)
    }

    /// Set a document's contribution
    fn replace(&mut self, document: DocumentId, triples: impl IntoIterator<Item = Triple>) -> LedgerDelta {
        let new: FxIndexSet<Triple> = triples.into_iter().collect();
        let old = self.documents.remove(&document).unwrap_or_default();

        let mut delta = LedgerDelta::default();
        for triple in old.iter().filter(|t| !new.contains(*t)) {
            if self.release(triple) {
                delta.removed.push(triple.clone());
            }
        }
        for triple in new.iter().filter(|t| !old.contains(*t)) {
            if self.retain(triple) {
                delta.added.push(triple.clone());
            }
        }

        self.documents.insert(document, new);
        delta
    }

    /// Drop a document's contribution; `None` if it was unknown
    fn remove(&mut self, document: &DocumentId) -> Option<Vec<Triple>> {
        let old = self.documents.remove(document)?;
        Some(old.into_iter().filter(|t| self.release(t)).collect())
    }

    /// True when the triple is new to the graph
    fn retain(&mut self, triple: &Triple) -> bool {
        let count = self.refcounts.entry(triple.clone()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// True when no document contributes the triple any more
    fn release(&mut self, triple: &Triple) -> bool {
        match self.refcounts.get_mut(triple) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.refcounts.remove(triple);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct ServiceState {
    graph: Option<Arc<IndexedGraph>>,
    ledger: DocumentLedger,
    /// Update generation of each document changed since the last rebuild
    touched: FxHashMap<DocumentId, u64>,
}

impl ServiceState {
    /// Writable graph plus ledger; fails before the first load
    fn loaded_mut(&mut self) -> SparqlResult<(&mut IndexedGraph, &mut DocumentLedger)> {
        let ServiceState { graph, ledger, .. } = self;
        let graph = graph.as_mut().ok_or(SparqlError::StoreNotInitialized)?;
        Ok((Arc::make_mut(graph), ledger))
    }
}

/// Query service over a triple source
pub struct QueryService {
    source: Arc<dyn TripleSource>,
    config: QueryServiceConfig,
    state: RwLock<ServiceState>,
    /// Bumped by every rebuild start and every dispose
    epoch: AtomicU64,
    /// Bumped by every per-document update, under the state write lock
    generation: AtomicU64,
}

impl QueryService {
    pub fn new(source: Arc<dyn TripleSource>, config: QueryServiceConfig) -> Self {
        Self {
            source,
            config,
            state: RwLock::new(ServiceState::default()),
            epoch: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &QueryServiceConfig {
        &self.config
    }

    /// Build the graph from every document of the source
    pub async fn load(&self) -> SparqlResult<LoadReport> {
        info!("Loading graph from source");
        self.rebuild().await
    }

    /// Rebuild from scratch, replacing the current contents
    ///
    /// Triples of documents deleted or renamed since the last build do not
    /// survive.
    pub async fn refresh(&self) -> SparqlResult<LoadReport> {
        info!("Refreshing graph from source");
        self.rebuild().await
    }

    async fn rebuild(&self) -> SparqlResult<LoadReport> {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let start = Instant::now();

        let mut graph = IndexedGraph::new();
        let mut ledger = DocumentLedger::default();
        let mut read_at = FxHashMap::default();
        let mut listed = FxHashSet::default();
        let mut extracted = 0;

        for document in self.source.document_ids().await? {
            if !listed.insert(document.clone()) {
                debug!(%document, "document listed twice, keeping first read");
                continue;
            }
            read_at.insert(document.clone(), self.generation.load(Ordering::SeqCst));
            let triples = match self.source.triples_for(&document).await {
                Ok(triples) => triples,
                Err(SourceError::DocumentNotFound(_)) => {
                    debug!(%document, "document vanished during rebuild");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            validate_document(&document, &triples)?;
            extracted += triples.len();
            let delta = ledger.replace(document, triples);
            apply_delta(&mut graph, delta)?;
        }
        let duplicates = extracted - graph.len();

        let mut state = self.state.write().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(epoch, "rebuild superseded, discarding");
            return Ok(LoadReport {
                documents: ledger.len(),
                triples: graph.len(),
                duplicates,
                elapsed: start.elapsed(),
                replayed: 0,
                superseded: true,
            });
        }
        let replayed = replay_updates(&state, &read_at, &mut graph, &mut ledger)?;
        let report = LoadReport {
            documents: ledger.len(),
            triples: graph.len(),
            duplicates,
            elapsed: start.elapsed(),
            replayed,
            superseded: false,
        };
        state.graph = Some(Arc::new(graph));
        state.ledger = ledger;
        state.touched.clear();

        info!(
            documents = report.documents,
            triples = report.triples,
            duplicates = report.duplicates,
            replayed = report.replayed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Graph ready"
        );
        Ok(report)
    }

    /// Execute an algebra tree against the current graph
    pub async fn query(&self, algebra: &Algebra) -> SparqlResult<SparqlResults> {
        let graph = self.snapshot().await.ok_or(SparqlError::StoreNotInitialized)?;
        SparqlExecutor::with_config(graph, self.config.executor.clone())
            .execute(algebra)
            .await
    }

    /// Release the graph and the document ledger
    pub async fn dispose(&self) {
        let mut state = self.state.write().await;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        *state = ServiceState::default();
        info!("Graph disposed");
    }

    /// Re-read one document and apply the difference
    ///
    /// A document the source no longer knows is removed.
    pub async fn reindex_document(&self, document: &DocumentId) -> SparqlResult<DocumentChange> {
        let triples = match self.source.triples_for(document).await {
            Ok(triples) => triples,
            Err(SourceError::DocumentNotFound(_)) => return self.remove_document(document).await,
            Err(e) => return Err(e.into()),
        };
        validate_document(document, &triples)?;

        let mut state = self.state.write().await;
        let (graph, ledger) = state.loaded_mut()?;
        let delta = ledger.replace(document.clone(), triples);
        let change = apply_delta(graph, delta)?;
        self.record_update(&mut state, document);
        debug!(%document, added = change.added, removed = change.removed, "document reindexed");
        Ok(change)
    }

    /// Forget a document; triples other documents still contribute stay
    pub async fn remove_document(&self, document: &DocumentId) -> SparqlResult<DocumentChange> {
        let mut state = self.state.write().await;
        let (graph, ledger) = state.loaded_mut()?;
        let change = match ledger.remove(document) {
            Some(removed) => apply_delta(
                graph,
                LedgerDelta {
                    added: Vec::new(),
                    removed,
                },
            )?,
            None => {
                debug!(%document, "remove of unknown document ignored");
                DocumentChange::default()
            }
        };
        // recorded even when unknown; an in-flight rebuild may still have read it
        self.record_update(&mut state, document);
        debug!(%document, removed = change.removed, "document removed");
        Ok(change)
    }

    /// Apply a pushed per-document delta without reading the source
    pub async fn apply_document_delta(
        &self,
        document: &DocumentId,
        added: Vec<Triple>,
        removed: Vec<Triple>,
    ) -> SparqlResult<DocumentChange> {
        validate_document(document, &added)?;

        let mut state = self.state.write().await;
        let (graph, ledger) = state.loaded_mut()?;
        let mut contribution = ledger.triples_of(document).cloned().unwrap_or_default();
        for triple in &removed {
            contribution.shift_remove(triple);
        }
        contribution.extend(added);

        let delta = ledger.replace(document.clone(), contribution);
        let change = apply_delta(graph, delta)?;
        self.record_update(&mut state, document);
        debug!(%document, added = change.added, removed = change.removed, "document delta applied");
        Ok(change)
    }

    fn record_update(&self, state: &mut ServiceState, document: &DocumentId) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        state.touched.insert(document.clone(), generation);
    }

    /// Current graph, if loaded
    pub async fn snapshot(&self) -> Option<Arc<IndexedGraph>> {
        self.state.read().await.graph.clone()
    }

    pub async fn is_loaded(&self) -> bool {
        self.state.read().await.graph.is_some()
    }

    pub async fn stats(&self) -> SparqlResult<GraphStats> {
        let state = self.state.read().await;
        let graph = state.graph.as_ref().ok_or(SparqlError::StoreNotInitialized)?;
        Ok(GraphStats {
            triples: graph.len(),
            subjects: graph.subjects().len(),
            predicates: graph.predicates().len(),
            objects: graph.objects().len(),
            documents: state.ledger.len(),
            epoch: self.epoch.load(Ordering::SeqCst),
        })
    }
}

fn validate_document(document: &DocumentId, triples: &[Triple]) -> SparqlResult<()> {
    for triple in triples {
        if let Err(e) = validate_triple(triple) {
            warn!(%document, error = %e, "document produced an invalid triple");
            return Err(e.into());
        }
    }
    Ok(())
}

/// Carry per-document updates that landed during a rebuild into its result
///
/// An update wins over the rebuild's read of the same document when it
/// committed after that read started, or when the rebuild never read the
/// document. Returns the number of documents carried over.
fn replay_updates(
    state: &ServiceState,
    read_at: &FxHashMap<DocumentId, u64>,
    graph: &mut IndexedGraph,
    ledger: &mut DocumentLedger,
) -> SparqlResult<usize> {
    let mut replayed = 0;
    for (document, &generation) in &state.touched {
        if read_at.get(document).is_some_and(|&read| read >= generation) {
            continue;
        }
        let delta = match state.ledger.triples_of(document) {
            Some(triples) => ledger.replace(document.clone(), triples.iter().cloned()),
            None => match ledger.remove(document) {
                Some(removed) => LedgerDelta {
                    added: Vec::new(),
                    removed,
                },
                None => continue,
            },
        };
        apply_delta(graph, delta)?;
        debug!(%document, "update carried into rebuild");
        replayed += 1;
    }
    Ok(replayed)
}

fn apply_delta(graph: &mut IndexedGraph, delta: LedgerDelta) -> SparqlResult<DocumentChange> {
    let mut change = DocumentChange::default();
    for triple in &delta.removed {
        if graph.remove(triple)? {
            change.removed += 1;
        }
    }
    change.added = graph.add_batch(delta.added)?.inserted;
    Ok(change)
}
