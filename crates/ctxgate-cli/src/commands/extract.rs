use ctxgate_corpus::{Annotation, Corpus, extract_corpus};
use ctxgate_routing::dominant_category;
use serde_json::json;

const EXTRACT_KIND: &str = "ctxgate.extract.v1";

pub fn run(docs: String, json_output: bool) {
    let corpus = Corpus::load_tree(&docs).unwrap_or_else(|err| {
        eprintln!("[extract] ERROR: {err}");
        std::process::exit(2);
    });

    let extraction = extract_corpus(&corpus);

    if json_output {
        let payload = json!({
            "schema": 1,
            "checkKind": EXTRACT_KIND,
            "annotations": extraction.annotations,
            "errors": extraction.errors,
        });
        let rendered = serde_json::to_string_pretty(&payload).unwrap_or_else(|err| {
            eprintln!("[extract] ERROR: failed to render payload: {err}");
            std::process::exit(2);
        });
        println!("{rendered}");
    } else {
        for annotation in &extraction.annotations {
            match annotation {
                Annotation::Routing(block) => {
                    let category = dominant_category(&block.keywords).unwrap_or("unclassified");
                    println!(
                        "routing {} ({}) keywords=[{}] category={} requests={}",
                        block.check_id,
                        block.source,
                        block.keywords.join("|"),
                        category,
                        block.requests.len(),
                    );
                }
                Annotation::Verification(block) => {
                    println!(
                        "verification {} ({}) tests={}",
                        block.check_id,
                        block.source,
                        block.tests.len(),
                    );
                }
            }
        }
        for error in &extraction.errors {
            println!("error [{}] {} ({})", error.class, error.message, error.source);
        }
    }

    if !extraction.accepted() {
        std::process::exit(1);
    }
}
