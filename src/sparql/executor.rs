//! Algebra executor
//!
//! Evaluates an [`Algebra`] tree against an immutable graph snapshot. The
//! tree is walked bottom-up and each node materializes its solution
//! sequence; long loops hand control back to the runtime every
//! `yield_interval` solutions so a large query does not starve other tasks.

use super::algebra::Algebra;
use super::binding::{HashJoin, QuerySolution};
use super::expression::Expression;
use super::matcher::PatternMatcher;
use super::optimizer::order_patterns;
use super::results::SparqlResults;
use super::{SparqlError, SparqlResult};
use crate::rdf::{BlankNode, IndexedGraph, Term, Triple, TriplePattern};
use futures::future::{BoxFuture, FutureExt};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Fail the query on a filter evaluation error instead of dropping the solution
    pub strict_filters: bool,
    /// Solutions processed between cooperative yields (0 disables yielding)
    pub yield_interval: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            strict_filters: false,
            yield_interval: 256,
        }
    }
}

/// Counts processed solutions and yields to the runtime at the interval
#[derive(Debug)]
struct YieldBudget {
    interval: usize,
    processed: usize,
}

impl YieldBudget {
    fn new(interval: usize) -> Self {
        Self { interval, processed: 0 }
    }

    async fn tick(&mut self, solutions: usize) {
        if self.interval == 0 {
            return;
        }
        self.processed += solutions;
        if self.processed >= self.interval {
            self.processed = 0;
            tokio::task::yield_now().await;
        }
    }
}

/// SPARQL algebra executor over one graph snapshot
#[derive(Debug, Clone)]
pub struct SparqlExecutor {
    graph: Arc<IndexedGraph>,
    config: ExecutorConfig,
}

impl SparqlExecutor {
    /// Create an executor with the default configuration
    pub fn new(graph: Arc<IndexedGraph>) -> Self {
        Self::with_config(graph, ExecutorConfig::default())
    }

    pub fn with_config(graph: Arc<IndexedGraph>, config: ExecutorConfig) -> Self {
        Self { graph, config }
    }

    /// The snapshot this executor reads
    pub fn graph(&self) -> &Arc<IndexedGraph> {
        &self.graph
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute an algebra tree
    ///
    /// A `Construct` root yields [`SparqlResults::Graph`]; every other root
    /// yields [`SparqlResults::Bindings`]. The whole tree is checked for
    /// unsupported nodes before evaluation starts.
    pub async fn execute(&self, algebra: &Algebra) -> SparqlResult<SparqlResults> {
        if let Some(node) = algebra.first_unsupported() {
            return Err(SparqlError::UnsupportedOperation(node.kind().to_string()));
        }

        let start = Instant::now();
        let mut budget = YieldBudget::new(self.config.yield_interval);
        let results = match algebra {
            Algebra::Construct { template, inner } => {
                let solutions = self.evaluate(inner, &mut budget).await?;
                let triples = self.construct(template, &solutions, &mut budget).await;
                SparqlResults::Graph(triples)
            }
            other => {
                let solutions = self.evaluate(other, &mut budget).await?;
                SparqlResults::Bindings {
                    variables: other.variables(),
                    solutions,
                }
            }
        };

        debug!(
            root = algebra.kind(),
            results = results.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "query executed"
        );
        Ok(results)
    }

    fn evaluate<'a>(
        &'a self,
        algebra: &'a Algebra,
        budget: &'a mut YieldBudget,
    ) -> BoxFuture<'a, SparqlResult<Vec<QuerySolution>>> {
        async move {
            let solutions = match algebra {
                Algebra::Bgp { patterns } => self.evaluate_bgp(patterns, budget).await,
                Algebra::Join { left, right } => {
                    let left = self.evaluate(left, budget).await?;
                    let right = self.evaluate(right, budget).await?;
                    self.evaluate_join(left, right, budget).await
                }
                Algebra::Filter { expression, inner } => {
                    let inner = self.evaluate(inner, budget).await?;
                    self.evaluate_filter(expression, inner, budget).await?
                }
                Algebra::Project { variables, inner } => {
                    let inner = self.evaluate(inner, budget).await?;
                    inner.iter().map(|solution| solution.project(variables)).collect()
                }
                Algebra::Construct { .. } => {
                    return Err(SparqlError::MalformedAlgebra(
                        "Construct is only valid at the root".to_string(),
                    ))
                }
                other => return Err(SparqlError::UnsupportedOperation(other.kind().to_string())),
            };
            trace!(node = algebra.kind(), solutions = solutions.len(), "evaluated");
            Ok(solutions)
        }
        .boxed()
    }

    /// Index nested-loop join over the ordered patterns
    async fn evaluate_bgp(&self, patterns: &[TriplePattern], budget: &mut YieldBudget) -> Vec<QuerySolution> {
        let matcher = PatternMatcher::new(&self.graph);
        let mut solutions = vec![QuerySolution::new()];

        for pattern in order_patterns(patterns) {
            trace!(%pattern, access = %matcher.access_path(pattern), "matching pattern");
            let mut next = Vec::new();
            for solution in &solutions {
                let before = next.len();
                next.extend(matcher.extend(pattern, solution));
                budget.tick(1 + next.len() - before).await;
            }
            solutions = next;
            if solutions.is_empty() {
                break;
            }
        }

        solutions
    }

    async fn evaluate_join(
        &self,
        left: Vec<QuerySolution>,
        right: Vec<QuerySolution>,
        budget: &mut YieldBudget,
    ) -> Vec<QuerySolution> {
        let hash_join = HashJoin::new(&left, right);
        trace!(keys = ?hash_join.keys(), "hash join");

        let mut joined = Vec::new();
        for solution in &left {
            joined.extend(hash_join.probe(solution));
            budget.tick(1).await;
        }
        joined
    }

    async fn evaluate_filter(
        &self,
        expression: &Expression,
        inner: Vec<QuerySolution>,
        budget: &mut YieldBudget,
    ) -> SparqlResult<Vec<QuerySolution>> {
        let mut kept = Vec::with_capacity(inner.len());
        for solution in inner {
            match expression.effective_boolean(&solution) {
                Ok(true) => kept.push(solution),
                Ok(false) => {}
                Err(e) if self.config.strict_filters => return Err(e.into()),
                Err(e) => trace!(%solution, error = %e, "filter dropped solution"),
            }
            budget.tick(1).await;
        }
        Ok(kept)
    }

    /// Instantiate the template once per solution
    async fn construct(
        &self,
        template: &[TriplePattern],
        solutions: &[QuerySolution],
        budget: &mut YieldBudget,
    ) -> Vec<Triple> {
        let mut triples = Vec::new();
        for solution in solutions {
            let mut blanks: FxHashMap<String, BlankNode> = FxHashMap::default();
            for pattern in template {
                if let Some(triple) = instantiate(pattern, solution, &mut blanks) {
                    triples.push(triple);
                }
            }
            budget.tick(1).await;
        }
        triples
    }
}

/// Fill one template triple; `None` if a variable is unbound or the result is invalid
fn instantiate(
    pattern: &TriplePattern,
    solution: &QuerySolution,
    blanks: &mut FxHashMap<String, BlankNode>,
) -> Option<Triple> {
    let mut fill = |term: &Term| -> Option<Term> {
        match term {
            Term::Variable(v) => solution.value(v).cloned(),
            Term::BlankNode(b) => Some(Term::BlankNode(
                blanks.entry(b.as_str().to_string()).or_default().clone(),
            )),
            other => Some(other.clone()),
        }
    };

    let triple = Triple::new(
        fill(&pattern.subject)?,
        fill(&pattern.predicate)?,
        fill(&pattern.object)?,
    );
    match triple.validate() {
        Ok(()) => Some(triple),
        Err(violation) => {
            trace!(%triple, position = %violation.position, "skipped template triple");
            None
        }
    }
}
