use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "ctxgate-cli-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, relative: &str, contents: &str) {
        let path = self.path.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dir should be created");
        }
        fs::write(&path, contents).expect("document should be written");
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn run_ctxgate<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = env!("CARGO_BIN_EXE_ctxgate");
    Command::new(bin)
        .args(args)
        .output()
        .expect("ctxgate command should execute")
}

fn run_ctxgate_with_env<I, S>(args: I, env: &[(&str, &str)]) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = env!("CARGO_BIN_EXE_ctxgate");
    let mut command = Command::new(bin);
    command.args(args);
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().expect("ctxgate command should execute")
}

fn assert_success(output: &Output) {
    if !output.status.success() {
        panic!(
            "command failed with status {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn assert_failure(output: &Output) {
    if output.status.success() {
        panic!(
            "command unexpectedly succeeded\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn parse_json_stdout(output: &Output) -> Value {
    serde_json::from_slice::<Value>(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "expected valid JSON stdout, got error: {e}\nstdout:\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn routing_doc(check_id: &str, keywords: &str, request: &str) -> String {
    format!(
        "# Router\n\n\
         <conditional-block context-check=\"{check_id}\" task-condition=\"{keywords}\">\n\
         REQUEST: \"{request}\"\n\
         </conditional-block>\n"
    )
}

fn write_clean_corpus(dir: &TempDirGuard) {
    dir.write(
        "root.md",
        &routing_doc(
            "root-route",
            "security|auth",
            "session hardening rules from standards/security.md#session-rules",
        ),
    );
    dir.write(
        "standards/security.md",
        "# Security Standards\n\n## Session Rules\n\nRotate session keys.\n",
    );
}

#[test]
fn route_check_accepts_clean_corpus() {
    let dir = TempDirGuard::new("route-ok");
    write_clean_corpus(&dir);

    let output = run_ctxgate([
        "route-check",
        "--docs",
        dir.path().to_str().unwrap(),
        "--root",
        "root.md",
    ]);
    assert_success(&output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("[route-check] OK"));

    let json = run_ctxgate([
        "route-check",
        "--docs",
        dir.path().to_str().unwrap(),
        "--root",
        "root.md",
        "--json",
    ]);
    assert_success(&json);
    let payload = parse_json_stdout(&json);
    assert_eq!(payload["checkKind"], "ctxgate.routing.check.v1");
    assert_eq!(payload["result"], "accepted");
    assert_eq!(payload["depthMap"]["standards/security.md"], 1);
}

#[test]
fn route_check_rejects_mutual_reference_cycle() {
    let dir = TempDirGuard::new("route-cycle");
    dir.write(
        "root.md",
        &routing_doc("root-route", "security", "peer rules from peer.md"),
    );
    dir.write(
        "peer.md",
        &routing_doc("peer-route", "security", "root rules from root.md"),
    );

    let output = run_ctxgate([
        "route-check",
        "--docs",
        dir.path().to_str().unwrap(),
        "--root",
        "root.md",
        "--json",
    ]);
    assert_failure(&output);
    let payload = parse_json_stdout(&output);
    let classes: Vec<&str> = payload["failureClasses"]
        .as_array()
        .expect("failureClasses array")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(classes.contains(&"routing.cycle"));
}

#[test]
fn route_check_rejects_four_hop_chain() {
    let dir = TempDirGuard::new("route-depth");
    dir.write("root.md", &routing_doc("r0", "security", "rules from a.md"));
    dir.write("a.md", &routing_doc("r1", "security", "rules from b.md"));
    dir.write("b.md", &routing_doc("r2", "security", "rules from c.md"));
    dir.write("c.md", &routing_doc("r3", "security", "rules from d.md"));
    dir.write("d.md", "# Deep Leaf\n");

    let output = run_ctxgate([
        "route-check",
        "--docs",
        dir.path().to_str().unwrap(),
        "--root",
        "root.md",
        "--json",
    ]);
    assert_failure(&output);
    let payload = parse_json_stdout(&output);
    assert!(
        payload["failureClasses"]
            .as_array()
            .unwrap()
            .iter()
            .any(|class| class == "routing.depth.exceeded")
    );
}

#[test]
fn route_check_rejects_duplicate_context_check_id() {
    let dir = TempDirGuard::new("route-dup");
    dir.write(
        "root.md",
        &routing_doc("shared", "security", "rules from leaf.md"),
    );
    dir.write(
        "leaf.md",
        "# Leaf\n\n\
         <verification-block context-check=\"shared\">\n\
         TEST noop:\n\
         COMMAND: true\n\
         </verification-block>\n",
    );

    let output = run_ctxgate([
        "route-check",
        "--docs",
        dir.path().to_str().unwrap(),
        "--root",
        "root.md",
        "--json",
    ]);
    assert_failure(&output);
    let payload = parse_json_stdout(&output);
    assert!(
        payload["failureClasses"]
            .as_array()
            .unwrap()
            .iter()
            .any(|class| class == "routing.id.duplicate")
    );
}

#[test]
fn route_check_reports_malformed_request_phrasing() {
    let dir = TempDirGuard::new("route-phrasing");
    dir.write(
        "root.md",
        "# Router\n\n\
         <conditional-block context-check=\"r0\" task-condition=\"security\">\n\
         REQUEST: \"just get the security rules\"\n\
         </conditional-block>\n",
    );

    let output = run_ctxgate([
        "route-check",
        "--docs",
        dir.path().to_str().unwrap(),
        "--root",
        "root.md",
        "--json",
    ]);
    assert_failure(&output);
    let payload = parse_json_stdout(&output);
    assert!(
        payload["failureClasses"]
            .as_array()
            .unwrap()
            .iter()
            .any(|class| class == "annotation.request.malformed")
    );
}

#[test]
fn lexicon_check_rejects_unknown_keyword() {
    let dir = TempDirGuard::new("lexicon");
    write_clean_corpus(&dir);

    let ok = run_ctxgate(["lexicon-check", "--docs", dir.path().to_str().unwrap()]);
    assert_success(&ok);

    dir.write(
        "drift.md",
        &routing_doc("drift-route", "blorp", "rules from root.md"),
    );
    let output = run_ctxgate([
        "lexicon-check",
        "--docs",
        dir.path().to_str().unwrap(),
        "--json",
    ]);
    assert_failure(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["checkKind"], "ctxgate.lexicon.check.v1");
    assert!(
        payload["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("blorp")
    );
}

fn write_matrix_doc(dir: &TempDirGuard) {
    dir.write(
        "checks.md",
        "# Pre-flight\n\n\
         <verification-block context-check=\"pre-flight\">\n\
         TEST t1:\n\
         COMMAND: true\n\
         BLOCKING: true\n\
         TEST t2:\n\
         COMMAND: false\n\
         DEPENDS_ON: t1\n\
         ERROR: \"t2 failed for ${PROJECT_NAME}\"\n\
         FIX: \"re-run the formatter\"\n\
         TEST t3:\n\
         COMMAND: true\n\
         </verification-block>\n",
    );
}

#[test]
fn verify_advisory_runs_everything_and_exits_zero() {
    let dir = TempDirGuard::new("verify-advisory");
    write_matrix_doc(&dir);

    let output = run_ctxgate([
        "verify",
        "--paths",
        "checks.md",
        "--mode",
        "advisory",
        "--repo-root",
        dir.path().to_str().unwrap(),
        "--json",
    ]);
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    let report = &payload["report"];
    assert_eq!(report["checkKind"], "ctxgate.verify.run.v1");
    assert_eq!(report["counts"]["passed"], 2);
    assert_eq!(report["counts"]["failed"], 1);
    assert_eq!(report["counts"]["skipped"], 0);
    assert_eq!(report["shouldHalt"], false);
}

#[test]
fn verify_blocking_halts_and_exits_nonzero() {
    let dir = TempDirGuard::new("verify-blocking");
    write_matrix_doc(&dir);

    let output = run_ctxgate([
        "verify",
        "--paths",
        "checks.md",
        "--mode",
        "blocking",
        "--repo-root",
        dir.path().to_str().unwrap(),
        "--json",
    ]);
    assert_failure(&output);
    let payload = parse_json_stdout(&output);
    let report = &payload["report"];
    assert_eq!(report["shouldHalt"], true);
    assert_eq!(report["counts"]["failed"], 1);

    let t2 = report["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|result| result["name"] == "t2")
        .expect("t2 result present");
    assert_eq!(t2["status"], "failed");
    assert!(
        t2["errorMessage"]
            .as_str()
            .unwrap()
            .starts_with("t2 failed for ")
    );
    assert_eq!(t2["fixHint"], "re-run the formatter");
}

#[test]
fn verify_denied_command_never_spawns() {
    let dir = TempDirGuard::new("verify-denied");
    let marker = dir.path().join("marker-file");
    dir.write(
        "checks.md",
        &format!(
            "# Checks\n\n\
             <verification-block context-check=\"denied-check\">\n\
             TEST denied:\n\
             COMMAND: cp /dev/null {}\n\
             BLOCKING: true\n\
             </verification-block>\n",
            marker.display()
        ),
    );

    let output = run_ctxgate([
        "verify",
        "--paths",
        "checks.md",
        "--mode",
        "blocking",
        "--repo-root",
        dir.path().to_str().unwrap(),
        "--json",
    ]);
    assert_failure(&output);
    assert!(!marker.exists(), "rejected command must never run");
    let payload = parse_json_stdout(&output);
    let result = &payload["report"]["results"][0];
    assert_eq!(result["status"], "failed");
    assert!(
        result["reason"]
            .as_str()
            .unwrap()
            .starts_with("governance violation")
    );
    assert!(result.get("command").is_none(), "no transcript for rejected command");
}

#[test]
fn verify_substitutes_environment_overrides() {
    let dir = TempDirGuard::new("verify-env");
    dir.write(
        "checks.md",
        "# Checks\n\n\
         <verification-block context-check=\"env-check\">\n\
         TEST echo_name:\n\
         COMMAND: echo project=${PROJECT_NAME}\n\
         VARIABLES: PROJECT_NAME\n\
         </verification-block>\n",
    );

    let output = run_ctxgate_with_env(
        [
            "verify",
            "--paths",
            "checks.md",
            "--repo-root",
            dir.path().to_str().unwrap(),
            "--json",
        ],
        &[("PROJECT_NAME", "override-name")],
    );
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["variables"]["PROJECT_NAME"], "override-name");
    let result = &payload["report"]["results"][0];
    assert_eq!(result["status"], "passed");
    assert!(
        result["stdout"]
            .as_str()
            .unwrap()
            .contains("project=override-name")
    );
}

#[test]
fn verify_dependency_cycle_aborts_without_running() {
    let dir = TempDirGuard::new("verify-cycle");
    dir.write(
        "checks.md",
        "# Checks\n\n\
         <verification-block context-check=\"cycle-check\">\n\
         TEST a:\n\
         COMMAND: true\n\
         DEPENDS_ON: b\n\
         TEST b:\n\
         COMMAND: true\n\
         DEPENDS_ON: a\n\
         </verification-block>\n",
    );

    let output = run_ctxgate([
        "verify",
        "--paths",
        "checks.md",
        "--repo-root",
        dir.path().to_str().unwrap(),
    ]);
    assert_failure(&output);
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("dependency cycle"),
        "stderr should name the cycle"
    );
}

#[test]
fn verify_missing_document_is_an_error() {
    let dir = TempDirGuard::new("verify-missing");
    let output = run_ctxgate([
        "verify",
        "--paths",
        "no-such.md",
        "--repo-root",
        dir.path().to_str().unwrap(),
    ]);
    assert_failure(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("document not found"));
}

#[test]
fn extract_dumps_annotations() {
    let dir = TempDirGuard::new("extract");
    write_clean_corpus(&dir);
    dir.write(
        "checks.md",
        "# Checks\n\n\
         <verification-block context-check=\"extract-check\">\n\
         TEST noop:\n\
         COMMAND: true\n\
         </verification-block>\n",
    );

    let output = run_ctxgate(["extract", "--docs", dir.path().to_str().unwrap(), "--json"]);
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["checkKind"], "ctxgate.extract.v1");
    let annotations = payload["annotations"].as_array().unwrap();
    assert_eq!(annotations.len(), 2);
    assert!(
        annotations
            .iter()
            .any(|annotation| annotation["kind"] == "verification")
    );
}
