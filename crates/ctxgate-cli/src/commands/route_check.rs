use ctxgate_corpus::{Corpus, extract_corpus};
use ctxgate_routing::check_routing;

pub fn run(docs: String, root: String, json_output: bool) {
    let corpus = Corpus::load_tree(&docs).unwrap_or_else(|err| {
        eprintln!("[route-check] ERROR: {err}");
        std::process::exit(2);
    });

    let extraction = extract_corpus(&corpus);
    let report = check_routing(&corpus, &extraction, &root);

    // advisory only: purity warnings never gate the exit code
    for warning in &report.warnings {
        eprintln!("[route-check] warning: {} ({})", warning.message, warning.source);
    }

    if json_output {
        let rendered = serde_json::to_string_pretty(&report).unwrap_or_else(|err| {
            eprintln!("[route-check] ERROR: failed to render report: {err}");
            std::process::exit(2);
        });
        println!("{rendered}");
    } else if report.accepted() {
        println!(
            "[route-check] OK (documents={}, routingBlocks={}, edges={}, maxDepth={})",
            report.summary.document_count,
            report.summary.routing_block_count,
            report.summary.edge_count,
            report
                .summary
                .max_depth
                .map(|depth| depth.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    } else {
        println!("[route-check] FAIL (errors={})", report.errors.len());
        for error in &report.errors {
            println!("  - [{}] {} ({})", error.class, error.message, error.source);
        }
    }

    if !report.accepted() {
        std::process::exit(1);
    }
}
