use notegraph::rdf::{
    AccessPath, AddOutcome, BlankNode, IndexedGraph, Literal, NamedNode, Position, RdfStoreError,
    Term, Triple,
};

fn iri(s: &str) -> Term {
    Term::iri(format!("http://example.org/{}", s)).unwrap()
}

fn sample_graph() -> (IndexedGraph, Vec<Triple>) {
    let triples = vec![
        Triple::new(iri("a"), iri("p"), iri("b")),
        Triple::new(iri("a"), iri("p"), iri("c")),
        Triple::new(iri("a"), iri("q"), iri("b")),
        Triple::new(iri("b"), iri("p"), iri("a")),
        Triple::new(iri("c"), iri("q"), Term::literal("open")),
        Triple::new(
            Term::BlankNode(BlankNode::with_id("x").unwrap()),
            iri("p"),
            Term::Literal(Literal::new_language_tagged_literal("hallo", "de").unwrap()),
        ),
    ];
    let mut graph = IndexedGraph::new();
    graph.add_batch(triples.clone()).unwrap();
    (graph, triples)
}

#[test]
fn test_add_is_idempotent() {
    let mut graph = IndexedGraph::new();
    let triple = Triple::new(iri("a"), iri("p"), iri("b"));

    assert_eq!(graph.add(triple.clone()).unwrap(), AddOutcome::Inserted);
    assert_eq!(graph.add(triple.clone()).unwrap(), AddOutcome::AlreadyPresent);
    assert_eq!(graph.len(), 1);
    assert_eq!(graph.match_pattern(Some(&triple.subject), None, None).count(), 1);
    assert!(graph.is_consistent());
}

#[test]
fn test_every_bound_combination_finds_stored_triples() {
    let (graph, triples) = sample_graph();

    for triple in &triples {
        assert!(graph.has(triple));
        for mask in 0..8u8 {
            let s = (mask & 1 != 0).then_some(&triple.subject);
            let p = (mask & 2 != 0).then_some(&triple.predicate);
            let o = (mask & 4 != 0).then_some(&triple.object);
            let matches = graph.match_pattern(s, p, o);
            let found: Vec<Triple> = matches.iter().collect();
            assert!(
                found.contains(triple),
                "{} not reachable via {}",
                triple,
                matches.access_path()
            );
            // every returned triple agrees with the bound positions
            for t in &found {
                assert!(s.map_or(true, |s| &t.subject == s));
                assert!(p.map_or(true, |p| &t.predicate == p));
                assert!(o.map_or(true, |o| &t.object == o));
            }
        }
    }
}

#[test]
fn test_access_path_selection() {
    let (graph, _) = sample_graph();
    let (a, p, b) = (iri("a"), iri("p"), iri("b"));

    let cases = [
        (Some(&a), Some(&p), Some(&b), AccessPath::Exact),
        (Some(&a), Some(&p), None, AccessPath::SubjectPredicate),
        (None, Some(&p), Some(&b), AccessPath::PredicateObject),
        (Some(&a), None, Some(&b), AccessPath::ObjectSubject),
        (Some(&a), None, None, AccessPath::Subject),
        (None, Some(&p), None, AccessPath::Predicate),
        (None, None, Some(&b), AccessPath::Object),
        (None, None, None, AccessPath::FullScan),
    ];
    for (s, p, o, expected) in cases {
        assert_eq!(graph.match_pattern(s, p, o).access_path(), expected);
    }
}

#[test]
fn test_pattern_counts() {
    let (graph, _) = sample_graph();

    assert_eq!(graph.match_pattern(Some(&iri("a")), None, None).count(), 3);
    assert_eq!(graph.match_pattern(None, Some(&iri("p")), None).count(), 4);
    assert_eq!(graph.match_pattern(None, None, Some(&iri("b"))).count(), 2);
    assert_eq!(graph.match_pattern(Some(&iri("a")), None, Some(&iri("b"))).count(), 2);
    assert_eq!(graph.match_pattern(None, None, None).count(), graph.len());
    assert_eq!(graph.match_pattern(Some(&iri("zzz")), None, None).count(), 0);
}

#[test]
fn test_removal() {
    let (mut graph, triples) = sample_graph();
    let victim = &triples[0];

    assert!(graph.remove(victim).unwrap());
    assert!(!graph.has(victim));
    assert!(!graph.remove(victim).unwrap());
    assert_eq!(graph.len(), triples.len() - 1);

    // no index still yields the removed triple
    for mask in 0..8u8 {
        let s = (mask & 1 != 0).then_some(&victim.subject);
        let p = (mask & 2 != 0).then_some(&victim.predicate);
        let o = (mask & 4 != 0).then_some(&victim.object);
        assert!(!graph.match_pattern(s, p, o).iter().any(|t| &t == victim));
    }
    assert!(graph.is_consistent());

    for triple in &triples[1..] {
        graph.remove(triple).unwrap();
    }
    assert!(graph.is_empty());
    assert!(graph.subjects().is_empty());
    assert!(graph.is_consistent());
}

#[test]
fn test_invalid_triples_rejected() {
    let mut graph = IndexedGraph::new();

    let literal_subject = Triple::new(Term::literal("x"), iri("p"), iri("b"));
    match graph.add(literal_subject) {
        Err(RdfStoreError::InvalidTriple { position, .. }) => assert_eq!(position, Position::Subject),
        other => panic!("expected InvalidTriple, got {:?}", other),
    }

    let variable_object = Triple::new(iri("a"), iri("p"), Term::variable("o").unwrap());
    assert!(graph.add(variable_object.clone()).is_err());
    assert!(graph.remove(&variable_object).is_err());

    // one bad triple rejects the whole batch
    let batch = vec![
        Triple::new(iri("a"), iri("p"), iri("b")),
        Triple::new(iri("a"), Term::BlankNode(BlankNode::new()), iri("b")),
    ];
    assert!(graph.add_batch(batch).is_err());
    assert!(graph.is_empty());
}

#[test]
fn test_typed_literals_are_distinct_terms() {
    let mut graph = IndexedGraph::new();
    let integer = NamedNode::new("http://www.w3.org/2001/XMLSchema#integer").unwrap();
    graph
        .add(Triple::new(iri("a"), iri("n"), Literal::new_typed_literal("1", integer)))
        .unwrap();
    graph.add(Triple::new(iri("a"), iri("n"), Term::literal("1"))).unwrap();

    assert_eq!(graph.len(), 2);
    assert_eq!(graph.objects().len(), 2);
}
