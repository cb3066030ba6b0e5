//! Annotation records: the two block shapes a document may carry.
//!
//! Everything else in a document is opaque prose as far as the engine
//! is concerned.

use serde::{Deserialize, Serialize};

/// One extracted annotation block.
///
/// The two shapes are parsed by the same extractor but consumed by
/// independent validators, so they stay a tagged union rather than a
/// shared base record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Annotation {
    #[serde(rename = "routing")]
    Routing(RoutingDirective),
    #[serde(rename = "verification")]
    Verification(VerificationBlock),
}

impl Annotation {
    /// The block's `context-check` identifier.
    pub fn check_id(&self) -> &str {
        match self {
            Annotation::Routing(block) => &block.check_id,
            Annotation::Verification(block) => &block.check_id,
        }
    }

    /// Root-relative path of the declaring document.
    pub fn source(&self) -> &str {
        match self {
            Annotation::Routing(block) => &block.source,
            Annotation::Verification(block) => &block.source,
        }
    }
}

/// A routing block: consult another document when a task matches one
/// of the declared keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDirective {
    pub check_id: String,
    pub source: String,
    /// `task-condition` keywords, in declaration order. Order matters
    /// for conflict precedence, not for graph validity.
    pub keywords: Vec<String>,
    pub requests: Vec<RoutingRequest>,
}

/// One `REQUEST:` line inside a routing block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRequest {
    pub description: String,
    pub target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_anchor: Option<String>,
}

/// A verification block: named executable assertions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationBlock {
    pub check_id: String,
    pub source: String,
    pub tests: Vec<VerificationTest>,
}

/// One named test record inside a verification block.
///
/// `name` is unique within its declaring document but not globally,
/// unlike the block's `context-check` identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationTest {
    pub name: String,
    pub command: String,
    pub required: bool,
    /// Defaults to `required` when the block does not say otherwise.
    pub blocking: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub source: String,
}
