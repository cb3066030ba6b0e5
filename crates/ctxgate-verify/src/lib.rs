//! # ctxgate-verify
//!
//! Verification runtime for embedded test blocks:
//! - per-run variable resolution and `${NAME}` substitution
//! - the command safety denylist (static pattern policy, no sandbox)
//! - dependency scheduling via topological sort
//! - the async executor (bounded concurrency, per-test timeouts,
//!   blocking/advisory halt policy)
//! - run reporting
//!
//! ```text
//! tests ──schedule──▶ total order ──executor──▶ RunReport
//!            │                         ▲
//!            └── cycle? abort          └── VariableSet + policy
//! ```

pub mod error;
pub mod executor;
pub mod report;
pub mod safety;
pub mod schedule;
pub mod variables;

pub use error::VerifyError;
pub use executor::{
    DEFAULT_TEST_TIMEOUT, ExecutorOptions, default_concurrency, run_tests,
};
pub use report::{
    ExecutionResult, RunCounts, RunMode, RunReport, TestStatus, VERIFY_RUN_KIND,
};
pub use safety::{GOVERNANCE_REASON_PREFIX, deny_reason};
pub use schedule::schedule;
pub use variables::{
    Resolver, VAR_PACKAGE_MANAGER, VAR_PROJECT_COVERAGE, VAR_PROJECT_NAME, VAR_PROJECT_TYPE,
    VARIABLE_NAMES, VariableSet,
};
