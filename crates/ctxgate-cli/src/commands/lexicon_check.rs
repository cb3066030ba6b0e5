use ctxgate_corpus::{Corpus, extract_corpus};
use ctxgate_routing::check_lexicon;

pub fn run(docs: String, json_output: bool) {
    let corpus = Corpus::load_tree(&docs).unwrap_or_else(|err| {
        eprintln!("[lexicon-check] ERROR: {err}");
        std::process::exit(2);
    });

    let extraction = extract_corpus(&corpus);
    let report = check_lexicon(&extraction);

    if json_output {
        let rendered = serde_json::to_string_pretty(&report).unwrap_or_else(|err| {
            eprintln!("[lexicon-check] ERROR: failed to render report: {err}");
            std::process::exit(2);
        });
        println!("{rendered}");
    } else if report.accepted() {
        println!(
            "[lexicon-check] OK (routingBlocks={}, keywords={})",
            report.summary.routing_block_count, report.summary.keyword_count,
        );
    } else {
        println!("[lexicon-check] FAIL (unknownKeywords={})", report.errors.len());
        for error in &report.errors {
            println!("  - {} ({})", error.message, error.source);
        }
    }

    if !report.accepted() {
        std::process::exit(1);
    }
}
