//! Error types for the verification runtime.

/// Errors that abort a verification run before any test executes.
///
/// Everything else (denied commands, unresolved variables, non-zero
/// exits, timeouts) becomes a `Failed` execution result instead, so
/// one bad test never hides the rest of the report.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("test {test:?} from {source_doc} depends on unknown test {dependency:?}")]
    UnknownDependency {
        test: String,
        source_doc: String,
        dependency: String,
    },

    #[error("dependency cycle: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error("invalid run mode {0:?}: expected \"blocking\" or \"advisory\"")]
    InvalidMode(String),
}
