//! Error types for corpus loading.

use std::path::PathBuf;

/// Errors raised while loading documents into a corpus.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("document not found: {}", path.display())]
    DocumentNotFound { path: PathBuf },

    #[error("failed reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corpus root is not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("document path escapes the corpus root: {}", path.display())]
    OutsideRoot { path: PathBuf },
}
