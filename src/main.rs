use notegraph::rdf::{Literal, NamedNode, NamespaceManager, Term, Triple, TriplePattern};
use notegraph::{
    Algebra, DocumentId, Expression, MemoryTripleSource, QueryService, QueryServiceConfig,
    SparqlResults, Variable,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("Notegraph v{}", notegraph::version());
    println!("==========================================");
    println!();

    let ns = NamespaceManager::new();
    let source = Arc::new(MemoryTripleSource::new());
    seed_vault(&ns, &source).await?;

    let service = QueryService::new(source.clone(), QueryServiceConfig::default());
    let report = service.load().await?;
    println!(
        "Loaded {} documents, {} triples ({} duplicates) in {:?}",
        report.documents, report.triples, report.duplicates, report.elapsed
    );

    // Demo 1: open tasks
    println!("\n=== Demo 1: Open tasks ===");
    let task = Variable::new("task")?;
    let title = Variable::new("title")?;
    let status = Variable::new("status")?;
    let open_tasks = Algebra::project(
        vec![task.clone(), title.clone()],
        Algebra::filter(
            Expression::equal(
                Expression::var(status.clone()),
                Expression::constant(Term::literal("open")),
            ),
            Algebra::bgp(vec![
                TriplePattern::new(task.clone(), ns.term("rdf:type")?, ns.term("note:Task")?),
                TriplePattern::new(task.clone(), ns.term("note:status")?, status),
                TriplePattern::new(task.clone(), ns.term("dc:title")?, title),
            ]),
        ),
    );
    print_results(&ns, &service.query(&open_tasks).await?);

    // Demo 2: derive a dependency graph
    println!("\n=== Demo 2: CONSTRUCT blocked-by edges ===");
    let blocker = Variable::new("blocker")?;
    let derived = Algebra::construct(
        vec![TriplePattern::new(blocker.clone(), ns.term("note:blocks")?, task.clone())],
        Algebra::bgp(vec![TriplePattern::new(
            task.clone(),
            ns.term("note:dependsOn")?,
            blocker,
        )]),
    );
    print_results(&ns, &service.query(&derived).await?);

    // Demo 3: incremental update
    println!("\n=== Demo 3: Close a task and reindex ===");
    let report_note = ns.term("note:write-report")?;
    source
        .insert_document(
            "tasks/report.md",
            vec![
                Triple::new(report_note.clone(), ns.term("rdf:type")?, ns.term("note:Task")?),
                Triple::new(report_note.clone(), ns.term("dc:title")?, Term::literal("Write report")),
                Triple::new(report_note, ns.term("note:status")?, Term::literal("done")),
            ],
        )
        .await;
    let change = service.reindex_document(&DocumentId::new("tasks/report.md")).await?;
    println!("Reindexed: +{} -{}", change.added, change.removed);
    print_results(&ns, &service.query(&open_tasks).await?);

    let stats = service.stats().await?;
    println!("\nGraph stats: {}", serde_json::to_string(&stats)?);

    service.dispose().await;
    Ok(())
}

async fn seed_vault(ns: &NamespaceManager, source: &MemoryTripleSource) -> anyhow::Result<()> {
    let task = ns.term("note:Task")?;
    let rdf_type = ns.term("rdf:type")?;
    let title = ns.term("dc:title")?;
    let status = ns.term("note:status")?;
    let due = ns.term("note:due")?;
    let xsd_date = NamedNode::new("http://www.w3.org/2001/XMLSchema#date")?;

    let report = ns.term("note:write-report")?;
    let review = ns.term("note:review-draft")?;
    let publish = ns.term("note:publish")?;

    source
        .insert_document(
            "tasks/report.md",
            vec![
                Triple::new(report.clone(), rdf_type.clone(), task.clone()),
                Triple::new(report.clone(), title.clone(), Term::literal("Write report")),
                Triple::new(report.clone(), status.clone(), Term::literal("open")),
                Triple::new(report.clone(), due.clone(), Literal::new_typed_literal("2026-11-02", xsd_date.clone())),
            ],
        )
        .await;
    source
        .insert_document(
            "tasks/review.md",
            vec![
                Triple::new(review.clone(), rdf_type.clone(), task.clone()),
                Triple::new(review.clone(), title.clone(), Term::literal("Review draft")),
                Triple::new(review.clone(), status.clone(), Term::literal("open")),
                Triple::new(review.clone(), ns.term("note:dependsOn")?, report),
            ],
        )
        .await;
    source
        .insert_document(
            "tasks/publish.md",
            vec![
                Triple::new(publish.clone(), rdf_type, task),
                Triple::new(publish.clone(), title, Term::literal("Publish")),
                Triple::new(publish.clone(), status, Term::literal("blocked")),
                Triple::new(publish, ns.term("note:dependsOn")?, review),
            ],
        )
        .await;
    Ok(())
}

fn print_results(ns: &NamespaceManager, results: &SparqlResults) {
    let show = |term: &Term| match term {
        Term::NamedNode(n) => ns.compact(n.as_str()).unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    };

    match results {
        SparqlResults::Bindings { solutions, .. } => {
            for solution in solutions {
                let row: Vec<String> = solution
                    .iter()
                    .map(|(name, term)| format!("?{} = {}", name, show(term)))
                    .collect();
                println!("  {}", row.join(", "));
            }
            println!("  ({} solutions)", solutions.len());
        }
        SparqlResults::Graph(triples) => {
            for triple in triples {
                println!(
                    "  {} {} {}",
                    show(&triple.subject),
                    show(&triple.predicate),
                    show(&triple.object)
                );
            }
            println!("  ({} triples)", triples.len());
        }
    }
}
