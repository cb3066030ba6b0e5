//! Test execution.
//!
//! One tokio task per test. Each test broadcasts its terminal status
//! on a watch channel; dependents wait on those signals (never poll),
//! then acquire a semaphore permit bounding host parallelism. The
//! blocking-mode halt is itself a watch channel: once a blocking test
//! fails, every not-yet-dispatched test observes the signal and
//! records itself skipped, while tests already mid-flight run to
//! completion or time out.

use crate::error::VerifyError;
use crate::report::{ExecutionResult, RunMode, RunReport, TestStatus};
use crate::safety::deny_reason;
use crate::schedule::schedule;
use crate::variables::VariableSet;
use chrono::Utc;
use ctxgate_corpus::VerificationTest;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{Semaphore, watch};
use tokio::time::timeout;
use uuid::Uuid;

/// Per-test wall-clock bound. Expiry kills the subprocess.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(30);

const CONCURRENCY_CEILING: usize = 8;
const CI_CONCURRENCY_CEILING: usize = 2;

/// Worker bound: host parallelism capped at 8, and at 2 under CI.
pub fn default_concurrency() -> usize {
    let host = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4);
    let limit = host.min(CONCURRENCY_CEILING).max(1);
    if std::env::var_os("CI").is_some() {
        limit.min(CI_CONCURRENCY_CEILING)
    } else {
        limit
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub mode: RunMode,
    pub timeout: Duration,
    pub concurrency: usize,
}

impl ExecutorOptions {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            timeout: DEFAULT_TEST_TIMEOUT,
            concurrency: default_concurrency(),
        }
    }
}

/// A test after variable substitution and policy evaluation.
#[derive(Debug, Clone)]
struct PreparedTest {
    test: VerificationTest,
    command: String,
    error_message: String,
    fix_hint: Option<String>,
    /// Failure established before any subprocess could exist.
    pre_failure: Option<PreFailure>,
}

#[derive(Debug, Clone)]
enum PreFailure {
    UnresolvedVariable { token: String },
    Denied { reason: String },
}

fn prepare(test: &VerificationTest, variables: &VariableSet) -> PreparedTest {
    let mut unresolved: Option<String> = None;
    for declared in &test.variables {
        if variables.get(declared).is_none() {
            unresolved.get_or_insert_with(|| declared.clone());
        }
    }

    let mut substitute = |input: &str| match variables.substitute(input) {
        Ok(value) => value,
        Err(token) => {
            unresolved.get_or_insert(token);
            input.to_string()
        }
    };

    let command = substitute(&test.command);
    let error_message = substitute(&test.error_message);
    let fix_hint = test.fix_hint.as_deref().map(&mut substitute);

    let pre_failure = if let Some(token) = unresolved {
        Some(PreFailure::UnresolvedVariable { token })
    } else {
        deny_reason(&command).map(|reason| PreFailure::Denied { reason })
    };

    PreparedTest {
        test: test.clone(),
        command,
        error_message,
        fix_hint,
        pre_failure,
    }
}

/// Run every test to a terminal state under the given policy.
///
/// Returns `Err` only when no total order exists (dependency cycle or
/// unknown dependency); that aborts the run before anything starts.
pub async fn run_tests(
    tests: Vec<VerificationTest>,
    variables: &VariableSet,
    options: &ExecutorOptions,
) -> Result<RunReport, VerifyError> {
    let order = schedule(&tests)?;
    let started_at = Utc::now();
    let run_id = Uuid::new_v4().to_string();

    let prepared: Arc<Vec<PreparedTest>> = Arc::new(
        tests
            .iter()
            .map(|test| prepare(test, variables))
            .collect(),
    );

    let mut index: BTreeMap<(String, String), usize> = BTreeMap::new();
    for (idx, test) in tests.iter().enumerate() {
        index.insert((test.source.clone(), test.name.clone()), idx);
    }

    let mut senders = Vec::with_capacity(tests.len());
    let mut receivers = Vec::with_capacity(tests.len());
    for _ in &tests {
        let (tx, rx) = watch::channel::<Option<TestStatus>>(None);
        senders.push(Some(tx));
        receivers.push(rx);
    }

    let (halt_tx, halt_rx) = watch::channel(false);
    let halt_tx = Arc::new(halt_tx);
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));

    let mut handles = Vec::with_capacity(tests.len());
    for idx in 0..tests.len() {
        let dependency_channels: Vec<(String, watch::Receiver<Option<TestStatus>>)> = tests[idx]
            .depends_on
            .iter()
            .map(|dep| {
                let dep_idx = index[&(tests[idx].source.clone(), dep.clone())];
                (dep.clone(), receivers[dep_idx].clone())
            })
            .collect();

        let prepared = Arc::clone(&prepared);
        let status_tx = senders[idx].take().expect("sender consumed once");
        let halt_tx = Arc::clone(&halt_tx);
        let halt_rx = halt_rx.clone();
        let semaphore = Arc::clone(&semaphore);
        let mode = options.mode;
        let test_timeout = options.timeout;

        handles.push(tokio::spawn(async move {
            let result = execute_one(
                &prepared[idx],
                dependency_channels,
                halt_rx,
                halt_tx.as_ref(),
                semaphore,
                mode,
                test_timeout,
            )
            .await;
            let _ = status_tx.send(Some(result.status));
            (idx, result)
        }));
    }

    let mut slots: Vec<Option<ExecutionResult>> = vec![None; tests.len()];
    for handle in handles {
        let (idx, result) = handle.await.expect("test task must not panic");
        slots[idx] = Some(result);
    }

    let results = order
        .into_iter()
        .map(|idx| slots[idx].take().expect("every test reaches a terminal state"))
        .collect();

    Ok(RunReport::assemble(run_id, options.mode, started_at, results))
}

async fn execute_one(
    prepared: &PreparedTest,
    dependency_channels: Vec<(String, watch::Receiver<Option<TestStatus>>)>,
    halt_rx: watch::Receiver<bool>,
    halt_tx: &watch::Sender<bool>,
    semaphore: Arc<Semaphore>,
    mode: RunMode,
    test_timeout: Duration,
) -> ExecutionResult {
    // dependencies first: a dependent transitions directly to skipped
    // when any dependency failed to reach `passed`
    for (dep_name, mut rx) in dependency_channels {
        let status = match rx.wait_for(Option::is_some).await {
            Ok(value) => (*value).unwrap_or(TestStatus::Failed),
            Err(_) => TestStatus::Failed,
        };
        if status != TestStatus::Passed {
            let word = match status {
                TestStatus::Failed => "failed",
                TestStatus::Skipped => "skipped",
                TestStatus::Passed => unreachable!(),
            };
            return skipped(prepared, format!("dependency {dep_name:?} {word}"));
        }
    }

    if *halt_rx.borrow() {
        return skipped(prepared, "run halted by an earlier blocking failure".to_string());
    }

    let _permit = semaphore
        .acquire_owned()
        .await
        .expect("semaphore is never closed");

    // the halt may have landed while this test waited for a permit
    if *halt_rx.borrow() {
        return skipped(prepared, "run halted by an earlier blocking failure".to_string());
    }

    let result = match &prepared.pre_failure {
        Some(PreFailure::UnresolvedVariable { token }) => failed_pre_execution(
            prepared,
            Some(prepared.command.clone()),
            format!("unresolved variable token ${{{token}}}"),
        ),
        Some(PreFailure::Denied { reason }) => {
            // never spawned; no command transcript exists
            failed_pre_execution(prepared, None, reason.clone())
        }
        None => run_command(prepared, test_timeout).await,
    };

    if result.status == TestStatus::Failed && prepared.test.blocking && mode == RunMode::Blocking {
        let _ = halt_tx.send(true);
    }

    result
}

async fn run_command(prepared: &PreparedTest, test_timeout: Duration) -> ExecutionResult {
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(&prepared.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            return failed(
                prepared,
                Some(prepared.command.clone()),
                String::new(),
                String::new(),
                None,
                format!("failed to spawn: {err}"),
            );
        }
    };

    match timeout(test_timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            let exit_code = output.status.code();
            if output.status.success() {
                ExecutionResult {
                    name: prepared.test.name.clone(),
                    source: prepared.test.source.clone(),
                    status: TestStatus::Passed,
                    required: prepared.test.required,
                    blocking: prepared.test.blocking,
                    stdout,
                    stderr,
                    exit_code,
                    reason: None,
                    command: Some(prepared.command.clone()),
                    fix_hint: prepared.fix_hint.clone(),
                    error_message: String::new(),
                    pre_execution: false,
                }
            } else {
                failed(
                    prepared,
                    Some(prepared.command.clone()),
                    stdout,
                    stderr,
                    exit_code,
                    match exit_code {
                        Some(code) => format!("exit status {code}"),
                        None => "terminated by signal".to_string(),
                    },
                )
            }
        }
        Ok(Err(err)) => failed(
            prepared,
            Some(prepared.command.clone()),
            String::new(),
            String::new(),
            None,
            format!("failed to collect output: {err}"),
        ),
        // dropping the in-flight future kills the child (kill_on_drop)
        Err(_) => failed(
            prepared,
            Some(prepared.command.clone()),
            String::new(),
            String::new(),
            None,
            format!("timed out after {}s", test_timeout.as_secs()),
        ),
    }
}

fn skipped(prepared: &PreparedTest, reason: String) -> ExecutionResult {
    ExecutionResult {
        name: prepared.test.name.clone(),
        source: prepared.test.source.clone(),
        status: TestStatus::Skipped,
        required: prepared.test.required,
        blocking: prepared.test.blocking,
        stdout: String::new(),
        stderr: String::new(),
        exit_code: None,
        reason: Some(reason),
        command: Some(prepared.command.clone()),
        pre_execution: false,
        fix_hint: None,
        error_message: String::new(),
    }
}

fn failed(
    prepared: &PreparedTest,
    command: Option<String>,
    stdout: String,
    stderr: String,
    exit_code: Option<i32>,
    reason: String,
) -> ExecutionResult {
    ExecutionResult {
        name: prepared.test.name.clone(),
        source: prepared.test.source.clone(),
        status: TestStatus::Failed,
        required: prepared.test.required,
        blocking: prepared.test.blocking,
        stdout,
        stderr,
        exit_code,
        reason: Some(reason),
        command,
        pre_execution: false,
        fix_hint: prepared.fix_hint.clone(),
        error_message: prepared.error_message.clone(),
    }
}

fn failed_pre_execution(
    prepared: &PreparedTest,
    command: Option<String>,
    reason: String,
) -> ExecutionResult {
    ExecutionResult {
        pre_execution: true,
        ..failed(prepared, command, String::new(), String::new(), None, reason)
    }
}
