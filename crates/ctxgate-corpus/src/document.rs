//! Documents and the corpus projection.
//!
//! A corpus is a deterministic snapshot of a markdown tree: every
//! document is keyed by its root-relative path (forward slashes), and
//! iteration order is the key order. Documents are immutable once
//! loaded.

use crate::error::CorpusError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DISPATCHER_MARKER: &str = "<!-- ctxgate: dispatcher -->";

/// One loaded document: root-relative path plus full text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub path: String,
    pub text: String,
}

impl Document {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// ATX heading texts, in document order.
    pub fn headings(&self) -> Vec<String> {
        self.text
            .lines()
            .filter_map(|line| {
                let trimmed = line.trim_start();
                let stripped = trimmed.trim_start_matches('#');
                let level = trimmed.len() - stripped.len();
                if (1..=6).contains(&level) && stripped.starts_with(' ') {
                    Some(stripped.trim().to_string())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Slugged heading set used for anchor resolution.
    pub fn heading_slugs(&self) -> BTreeSet<String> {
        self.headings().iter().map(|h| heading_slug(h)).collect()
    }

    /// Whether `anchor` resolves to a heading in this document.
    pub fn has_anchor(&self, anchor: &str) -> bool {
        self.heading_slugs().contains(&heading_slug(anchor))
    }

    /// Whether this document is flagged as a pure router.
    pub fn is_dispatcher(&self) -> bool {
        self.text.contains(DISPATCHER_MARKER)
    }
}

/// Anchor slug transform: lower-case, punctuation stripped, whitespace
/// runs collapsed to a single hyphen.
pub fn heading_slug(heading: &str) -> String {
    let mut slug = String::with_capacity(heading.len());
    let mut pending_hyphen = false;
    for ch in heading.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_hyphen = true;
        }
        // remaining punctuation is dropped
    }
    slug
}

/// Deterministic in-memory snapshot of a document tree.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    root: PathBuf,
    documents: BTreeMap<String, Document>,
}

impl Corpus {
    /// Build a corpus from fully-materialized documents (tests, tools).
    pub fn from_documents(root: impl Into<PathBuf>, documents: Vec<Document>) -> Self {
        let mut index = BTreeMap::new();
        for document in documents {
            index.insert(document.path.clone(), document);
        }
        Self {
            root: root.into(),
            documents: index,
        }
    }

    /// Load every markdown file under `root`, in key order.
    pub fn load_tree(root: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(CorpusError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let is_markdown = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
            if !is_markdown {
                continue;
            }
            documents.push(read_document(root, entry.path())?);
        }

        Ok(Self::from_documents(root, documents))
    }

    /// Load an explicit list of document paths, resolved against `root`.
    ///
    /// Missing paths are hard errors; the verification flow must never
    /// silently drop a requested document.
    pub fn load_paths(
        root: impl AsRef<Path>,
        paths: &[String],
    ) -> Result<Self, CorpusError> {
        let root = root.as_ref();
        let mut documents = Vec::new();
        for raw in paths {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            let candidate = root.join(trimmed);
            let path = if candidate.is_file() {
                candidate
            } else {
                let direct = PathBuf::from(trimmed);
                if direct.is_file() {
                    direct
                } else {
                    return Err(CorpusError::DocumentNotFound { path: candidate });
                }
            };
            documents.push(read_document(root, &path)?);
        }
        Ok(Self::from_documents(root, documents))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Lookup one document by its root-relative key.
    pub fn get(&self, key: &str) -> Option<&Document> {
        self.documents
            .get(key)
            .or_else(|| self.documents.get(key.trim_start_matches("./")))
    }

    /// Documents in key order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Root-relative keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }
}

fn read_document(root: &Path, path: &Path) -> Result<Document, CorpusError> {
    let text = fs::read_to_string(path).map_err(|source| CorpusError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let key = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/");
    Ok(Document::new(key, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowers_strips_and_hyphenates() {
        assert_eq!(heading_slug("Session Rules"), "session-rules");
        assert_eq!(heading_slug("API  Design (v2)!"), "api-design-v2");
        assert_eq!(heading_slug("error_handling"), "error-handling");
    }

    #[test]
    fn headings_ignore_non_atx_lines() {
        let doc = Document::new(
            "a.md",
            "# Top\nprose #not-a-heading\n## Session Rules\n####### too deep\n",
        );
        assert_eq!(doc.headings(), vec!["Top", "Session Rules"]);
        assert!(doc.has_anchor("session-rules"));
        assert!(!doc.has_anchor("missing"));
    }

    #[test]
    fn dispatcher_marker_is_detected() {
        let doc = Document::new("r.md", "<!-- ctxgate: dispatcher -->\n# Router\n");
        assert!(doc.is_dispatcher());
        assert!(!Document::new("p.md", "# Prose\n").is_dispatcher());
    }

    #[test]
    fn corpus_lookup_tolerates_dot_slash() {
        let corpus = Corpus::from_documents(".", vec![Document::new("sub/a.md", "# A\n")]);
        assert!(corpus.get("sub/a.md").is_some());
        assert!(corpus.get("./sub/a.md").is_some());
        assert!(corpus.get("sub/b.md").is_none());
    }
}
