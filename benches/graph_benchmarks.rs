use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use notegraph::rdf::{IndexedGraph, Term, Triple, TriplePattern};
use notegraph::sparql::{Algebra, SparqlExecutor};
use std::sync::Arc;

fn iri(s: &str) -> Term {
    Term::iri(format!("http://example.org/{}", s)).unwrap()
}

/// Notes linking to the next note, each typed and titled
fn vault_triples(size: usize) -> Vec<Triple> {
    let rdf_type = Term::iri("http://www.w3.org/1999/02/22-rdf-syntax-ns#type").unwrap();
    let (note, links, title) = (iri("Note"), iri("links"), iri("title"));
    (0..size)
        .flat_map(|i| {
            let subject = iri(&format!("note{}", i));
            [
                Triple::new(subject.clone(), rdf_type.clone(), note.clone()),
                Triple::new(subject.clone(), title.clone(), Term::literal(format!("Note {}", i))),
                Triple::new(subject, links.clone(), iri(&format!("note{}", (i + 1) % size))),
            ]
        })
        .collect()
}

/// Benchmark bulk insertion throughput
fn bench_bulk_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_insert");

    for size in [100, 1000, 10_000].iter() {
        let triples = vault_triples(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut graph = IndexedGraph::new();
                graph.add_batch(triples.iter().cloned()).unwrap();
                criterion::black_box(graph.len());
            });
        });
    }
    group.finish();
}

/// Benchmark single-position lookups through the POS index
fn bench_match_by_predicate(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_by_predicate");

    for size in [100, 1000, 10_000].iter() {
        let mut graph = IndexedGraph::new();
        graph.add_batch(vault_triples(*size)).unwrap();
        let links = iri("links");

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let count = graph.match_pattern(None, Some(&links), None).count();
                criterion::black_box(count);
            });
        });
    }
    group.finish();
}

/// Benchmark a two-hop BGP join
fn bench_bgp_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("bgp_join");
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

    for size in [100, 1000, 10_000].iter() {
        let mut graph = IndexedGraph::new();
        graph.add_batch(vault_triples(*size)).unwrap();
        let executor = SparqlExecutor::new(Arc::new(graph));

        let var = |name: &str| Term::variable(name).unwrap();
        let algebra = Algebra::bgp(vec![
            TriplePattern::new(var("a"), iri("links"), var("b")),
            TriplePattern::new(var("b"), iri("links"), var("c")),
            TriplePattern::new(var("c"), iri("title"), var("t")),
        ]);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let results = runtime.block_on(executor.execute(&algebra)).unwrap();
                criterion::black_box(results.len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_bulk_insert, bench_match_by_predicate, bench_bgp_join);
criterion_main!(benches);
