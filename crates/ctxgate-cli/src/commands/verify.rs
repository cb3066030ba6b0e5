use ctxgate_corpus::{Annotation, Corpus, VerificationTest, extract_corpus};
use ctxgate_verify::{ExecutorOptions, Resolver, RunMode, run_tests};
use serde_json::json;
use std::str::FromStr;

pub fn run(paths: Vec<String>, mode: String, repo_root: String, json_output: bool) {
    let mode = RunMode::from_str(&mode).unwrap_or_else(|err| {
        eprintln!("[verify] ERROR: {err}");
        std::process::exit(2);
    });

    let corpus = Corpus::load_paths(&repo_root, &paths).unwrap_or_else(|err| {
        eprintln!("[verify] ERROR: {err}");
        std::process::exit(2);
    });

    let extraction = extract_corpus(&corpus);
    // structural errors are accumulated, not fail-fast: the healthy
    // documents' tests still run, but the exit stays non-zero
    for error in &extraction.errors {
        eprintln!("[verify] error: [{}] {} ({})", error.class, error.message, error.source);
    }

    let tests: Vec<VerificationTest> = extraction
        .annotations
        .iter()
        .filter_map(|annotation| match annotation {
            Annotation::Verification(block) => Some(block.tests.clone()),
            Annotation::Routing(_) => None,
        })
        .flatten()
        .collect();

    let variables = Resolver::from_process_env(&repo_root).resolve();
    let options = ExecutorOptions::new(mode);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|err| {
            eprintln!("[verify] ERROR: failed to create tokio runtime: {err}");
            std::process::exit(2);
        });

    let report = runtime
        .block_on(run_tests(tests, &variables, &options))
        .unwrap_or_else(|err| {
            // no valid total order: nothing was executed
            eprintln!("[verify] ERROR: {err}");
            std::process::exit(1);
        });

    if json_output {
        let payload = json!({
            "schema": 1,
            "structuralErrors": extraction.errors,
            "variables": variables.values(),
            "report": report,
        });
        let rendered = serde_json::to_string_pretty(&payload).unwrap_or_else(|err| {
            eprintln!("[verify] ERROR: failed to render report: {err}");
            std::process::exit(2);
        });
        println!("{rendered}");
    } else {
        print!("{}", report.render_human());
    }

    if !extraction.accepted() || !report.exit_success() {
        std::process::exit(1);
    }
}
