//! Run reporting: per-test results, counts, halt policy.

use crate::error::VerifyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const VERIFY_RUN_KIND: &str = "ctxgate.verify.run.v1";

/// Halting policy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// A failing `blocking=true` test stops all further scheduling.
    Blocking,
    /// Every test runs to a terminal state regardless of failures.
    Advisory,
}

impl FromStr for RunMode {
    type Err = VerifyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "blocking" => Ok(RunMode::Blocking),
            "advisory" => Ok(RunMode::Advisory),
            other => Err(VerifyError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Blocking => write!(f, "blocking"),
            RunMode::Advisory => write!(f, "advisory"),
        }
    }
}

/// Terminal status of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

/// Outcome of one test, in scheduler order in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub name: String,
    pub source: String,
    pub status: TestStatus,
    pub required: bool,
    pub blocking: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The exact command attempted. Absent when the safety filter
    /// rejected the test pre-execution; the rejection reason stands
    /// in for a transcript that never existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// True for failures established before any subprocess could
    /// exist (unresolved variable, denied command). These are hard
    /// failures in every mode.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pre_execution: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Terminal artifact of one verification run. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub check_kind: String,
    pub run_id: String,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counts: RunCounts,
    pub results: Vec<ExecutionResult>,
    pub should_halt: bool,
}

impl RunReport {
    pub fn assemble(
        run_id: String,
        mode: RunMode,
        started_at: DateTime<Utc>,
        results: Vec<ExecutionResult>,
    ) -> Self {
        let mut counts = RunCounts::default();
        for result in &results {
            match result.status {
                TestStatus::Passed => counts.passed += 1,
                TestStatus::Failed => counts.failed += 1,
                TestStatus::Skipped => counts.skipped += 1,
            }
        }
        let should_halt = mode == RunMode::Blocking
            && results
                .iter()
                .any(|result| result.status == TestStatus::Failed && result.blocking);
        Self {
            check_kind: VERIFY_RUN_KIND.to_string(),
            run_id,
            mode,
            started_at,
            finished_at: Utc::now(),
            counts,
            results,
            should_halt,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results
            .iter()
            .filter(|result| result.status == TestStatus::Failed)
    }

    /// Pre-execution failures (unresolved variables, denied commands)
    /// are never downgraded by advisory mode.
    pub fn has_pre_execution_failures(&self) -> bool {
        self.results.iter().any(|result| result.pre_execution)
    }

    /// Whether the process should exit zero for this report alone.
    pub fn exit_success(&self) -> bool {
        if self.has_pre_execution_failures() {
            return false;
        }
        match self.mode {
            RunMode::Blocking => !self.should_halt,
            RunMode::Advisory => true,
        }
    }

    /// Human rendering: summary counts, then one detail block per
    /// failure.
    pub fn render_human(&self) -> String {
        let mut out = format!(
            "verification run {} ({} mode): {} passed, {} failed, {} skipped\n",
            self.run_id, self.mode, self.counts.passed, self.counts.failed, self.counts.skipped
        );
        for failure in self.failures() {
            out.push_str(&format!("\nFAIL {} ({})\n", failure.name, failure.source));
            if let Some(reason) = &failure.reason {
                out.push_str(&format!("  reason: {reason}\n"));
            }
            if !failure.error_message.is_empty() {
                out.push_str(&format!("  error: {}\n", failure.error_message));
            }
            match &failure.command {
                Some(command) => out.push_str(&format!("  command: {command}\n")),
                None => out.push_str("  command: <rejected before execution>\n"),
            }
            if let Some(fix_hint) = &failure.fix_hint {
                out.push_str(&format!("  fix: {fix_hint}\n"));
            }
        }
        if self.should_halt {
            out.push_str("\nrun halted: a blocking test failed\n");
        }
        out
    }
}
