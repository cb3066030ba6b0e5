//! # ctxgate-corpus
//!
//! Corpus layer for context-document governance.
//!
//! This crate provides:
//! - `Document` and `Corpus` (deterministic in-memory projection of a
//!   markdown tree)
//! - heading extraction and the anchor slug transform
//! - annotation extraction for the two recognized block shapes
//!   (routing directives and verification blocks)
//!
//! It intentionally does not validate graph structure or execute
//! anything. Those concerns live in `ctxgate-routing` and
//! `ctxgate-verify`.

pub mod annotation;
pub mod document;
pub mod error;
pub mod extract;

pub use annotation::{
    Annotation, RoutingDirective, RoutingRequest, VerificationBlock, VerificationTest,
};
pub use document::{Corpus, Document, heading_slug};
pub use error::CorpusError;
pub use extract::{
    CLASS_BLOCK_ID_MISSING, CLASS_FIELD_INVALID, CLASS_REQUEST_MALFORMED,
    CLASS_TEST_COMMAND_MISSING, CLASS_TEST_DUPLICATE_NAME, Extraction, StructuralFinding,
    extract_corpus, extract_document,
};
