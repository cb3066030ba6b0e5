//! Annotation extraction over document text.
//!
//! Bounded, non-greedy scans for the two fenced shapes. Structural
//! errors abort the offending block only; extraction continues across
//! blocks and documents so a run reports every malformed annotation
//! in one pass.

use crate::annotation::{
    Annotation, RoutingDirective, RoutingRequest, VerificationBlock, VerificationTest,
};
use crate::document::{Corpus, Document};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

pub const CLASS_BLOCK_ID_MISSING: &str = "annotation.block.id_missing";
pub const CLASS_REQUEST_MALFORMED: &str = "annotation.request.malformed";
pub const CLASS_TEST_COMMAND_MISSING: &str = "annotation.test.command_missing";
pub const CLASS_TEST_DUPLICATE_NAME: &str = "annotation.test.duplicate_name";
pub const CLASS_FIELD_INVALID: &str = "annotation.field.invalid";

/// A structural extraction error, attributed to its document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StructuralFinding {
    pub source: String,
    pub class: String,
    pub message: String,
}

/// Result of scanning one or more documents.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub annotations: Vec<Annotation>,
    pub errors: Vec<StructuralFinding>,
}

impl Extraction {
    pub fn accepted(&self) -> bool {
        self.errors.is_empty()
    }

    fn merge(&mut self, other: Extraction) {
        self.annotations.extend(other.annotations);
        self.errors.extend(other.errors);
    }
}

fn routing_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<conditional-block\b([^>]*)>(.*?)</conditional-block>")
            .expect("routing block regex must compile")
    })
}

fn verification_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<verification-block\b([^>]*)>(.*?)</verification-block>")
            .expect("verification block regex must compile")
    })
}

fn context_check_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"context-check="([^"]+)""#).expect("context-check attr regex must compile")
    })
}

fn task_condition_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"task-condition="([^"]*)""#).expect("task-condition attr regex must compile")
    })
}

fn request_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*REQUEST:[ \t]*(.+?)[ \t]*$"#)
            .expect("request line regex must compile")
    })
}

// Greedy description so a literal "from" inside the description does
// not split the payload early; the last " from " wins.
fn request_payload_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.+\S)\s+from\s+(\S+)$").expect("request payload regex must compile")
    })
}

fn test_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[ \t]*TEST[ \t]+([A-Za-z0-9_][A-Za-z0-9_-]*)[ \t]*:[ \t]*$")
            .expect("test header regex must compile")
    })
}

fn test_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[ \t]*([A-Z][A-Z_]*)[ \t]*:[ \t]*(.*?)[ \t]*$")
            .expect("test field regex must compile")
    })
}

fn strip_quotes(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Scan every document in `corpus`, in key order.
pub fn extract_corpus(corpus: &Corpus) -> Extraction {
    let mut extraction = Extraction::default();
    for document in corpus.documents() {
        extraction.merge(extract_document(document));
    }
    extraction
}

/// Scan one document for both block shapes.
pub fn extract_document(document: &Document) -> Extraction {
    let mut extraction = Extraction::default();

    for captures in routing_block_re().captures_iter(&document.text) {
        let attrs = captures.get(1).map_or("", |m| m.as_str());
        let body = captures.get(2).map_or("", |m| m.as_str());
        extract_routing_block(document, attrs, body, &mut extraction);
    }

    for captures in verification_block_re().captures_iter(&document.text) {
        let attrs = captures.get(1).map_or("", |m| m.as_str());
        let body = captures.get(2).map_or("", |m| m.as_str());
        extract_verification_block(document, attrs, body, &mut extraction);
    }

    extraction
}

fn block_check_id(
    document: &Document,
    attrs: &str,
    shape: &str,
    errors: &mut Vec<StructuralFinding>,
) -> Option<String> {
    match context_check_attr_re()
        .captures(attrs)
        .and_then(|row| row.get(1))
    {
        Some(id) => Some(id.as_str().trim().to_string()),
        None => {
            errors.push(StructuralFinding {
                source: document.path.clone(),
                class: CLASS_BLOCK_ID_MISSING.to_string(),
                message: format!("{shape} block is missing a context-check identifier"),
            });
            None
        }
    }
}

fn extract_routing_block(
    document: &Document,
    attrs: &str,
    body: &str,
    extraction: &mut Extraction,
) {
    let Some(check_id) = block_check_id(document, attrs, "routing", &mut extraction.errors) else {
        return;
    };

    let keywords = task_condition_attr_re()
        .captures(attrs)
        .and_then(|row| row.get(1))
        .map(|m| {
            m.as_str()
                .split('|')
                .map(str::trim)
                .filter(|kw| !kw.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut requests = Vec::new();
    let mut block_errors = Vec::new();
    let mut saw_request_line = false;

    for captures in request_line_re().captures_iter(body) {
        saw_request_line = true;
        let payload = strip_quotes(captures.get(1).map_or("", |m| m.as_str()));
        match request_payload_re().captures(payload) {
            Some(parts) => {
                let description = parts[1].trim().to_string();
                let target = parts[2].trim();
                let (target_path, target_anchor) = match target.split_once('#') {
                    Some((path, anchor)) => (path.to_string(), Some(anchor.to_string())),
                    None => (target.to_string(), None),
                };
                requests.push(RoutingRequest {
                    description,
                    target_path,
                    target_anchor,
                });
            }
            None => {
                block_errors.push(StructuralFinding {
                    source: document.path.clone(),
                    class: CLASS_REQUEST_MALFORMED.to_string(),
                    message: format!(
                        "routing block {check_id:?}: REQUEST payload {payload:?} does not match \
                         \"<description> from <path>[#anchor]\""
                    ),
                });
            }
        }
    }

    if !saw_request_line {
        block_errors.push(StructuralFinding {
            source: document.path.clone(),
            class: CLASS_REQUEST_MALFORMED.to_string(),
            message: format!("routing block {check_id:?} declares no REQUEST line"),
        });
    }

    if block_errors.is_empty() {
        extraction.annotations.push(Annotation::Routing(RoutingDirective {
            check_id,
            source: document.path.clone(),
            keywords,
            requests,
        }));
    } else {
        extraction.errors.extend(block_errors);
    }
}

#[derive(Default)]
struct TestRecord {
    name: String,
    command: Option<String>,
    required: Option<bool>,
    blocking: Option<bool>,
    error_message: String,
    fix_hint: Option<String>,
    depends_on: Vec<String>,
    variables: Vec<String>,
    description: String,
}

impl TestRecord {
    fn finish(
        self,
        document: &Document,
        check_id: &str,
        errors: &mut Vec<StructuralFinding>,
    ) -> Option<VerificationTest> {
        let Some(command) = self.command else {
            errors.push(StructuralFinding {
                source: document.path.clone(),
                class: CLASS_TEST_COMMAND_MISSING.to_string(),
                message: format!(
                    "verification block {check_id:?}: test {:?} has no COMMAND",
                    self.name
                ),
            });
            return None;
        };
        let required = self.required.unwrap_or(true);
        Some(VerificationTest {
            name: self.name,
            command,
            required,
            // an unspecified BLOCKING inherits REQUIRED
            blocking: self.blocking.unwrap_or(required),
            error_message: self.error_message,
            fix_hint: self.fix_hint,
            depends_on: self.depends_on,
            variables: self.variables,
            description: self.description,
            source: document.path.clone(),
        })
    }
}

fn parse_bool(
    document: &Document,
    check_id: &str,
    field: &str,
    value: &str,
    errors: &mut Vec<StructuralFinding>,
) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        other => {
            errors.push(StructuralFinding {
                source: document.path.clone(),
                class: CLASS_FIELD_INVALID.to_string(),
                message: format!(
                    "verification block {check_id:?}: {field} must be true or false, got {other:?}"
                ),
            });
            None
        }
    }
}

fn extract_verification_block(
    document: &Document,
    attrs: &str,
    body: &str,
    extraction: &mut Extraction,
) {
    let Some(check_id) = block_check_id(document, attrs, "verification", &mut extraction.errors)
    else {
        return;
    };

    let mut tests: Vec<VerificationTest> = Vec::new();
    let mut block_errors = Vec::new();
    let mut seen_names = BTreeSet::new();
    let mut current: Option<TestRecord> = None;

    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(header) = test_header_re().captures(line) {
            if let Some(record) = current.take()
                && let Some(test) = record.finish(document, &check_id, &mut block_errors)
            {
                tests.push(test);
            }
            let name = header[1].to_string();
            if !seen_names.insert(name.clone()) {
                block_errors.push(StructuralFinding {
                    source: document.path.clone(),
                    class: CLASS_TEST_DUPLICATE_NAME.to_string(),
                    message: format!(
                        "verification block {check_id:?}: duplicate test name {name:?}"
                    ),
                });
            }
            current = Some(TestRecord {
                name,
                ..TestRecord::default()
            });
            continue;
        }

        let Some(field) = test_field_re().captures(line) else {
            block_errors.push(StructuralFinding {
                source: document.path.clone(),
                class: CLASS_FIELD_INVALID.to_string(),
                message: format!(
                    "verification block {check_id:?}: unrecognized line {:?}",
                    line.trim()
                ),
            });
            continue;
        };

        let Some(record) = current.as_mut() else {
            block_errors.push(StructuralFinding {
                source: document.path.clone(),
                class: CLASS_FIELD_INVALID.to_string(),
                message: format!(
                    "verification block {check_id:?}: field {:?} appears before any TEST header",
                    &field[1]
                ),
            });
            continue;
        };

        let value = field.get(2).map_or("", |m| m.as_str());
        match &field[1] {
            "COMMAND" => record.command = Some(strip_quotes(value).to_string()),
            "REQUIRED" => {
                record.required =
                    parse_bool(document, &check_id, "REQUIRED", value, &mut block_errors);
            }
            "BLOCKING" => {
                record.blocking =
                    parse_bool(document, &check_id, "BLOCKING", value, &mut block_errors);
            }
            "ERROR" => record.error_message = strip_quotes(value).to_string(),
            "FIX" => record.fix_hint = Some(strip_quotes(value).to_string()),
            "DEPENDS_ON" => record.depends_on = split_list(value),
            "VARIABLES" => record.variables = split_list(value),
            "DESCRIPTION" => record.description = strip_quotes(value).to_string(),
            other => {
                block_errors.push(StructuralFinding {
                    source: document.path.clone(),
                    class: CLASS_FIELD_INVALID.to_string(),
                    message: format!(
                        "verification block {check_id:?}: unknown field {other:?}"
                    ),
                });
            }
        }
    }

    if let Some(record) = current.take()
        && let Some(test) = record.finish(document, &check_id, &mut block_errors)
    {
        tests.push(test);
    }

    // a structural error poisons the whole block: partial test sets
    // must not reach the scheduler
    if block_errors.is_empty() {
        extraction
            .annotations
            .push(Annotation::Verification(VerificationBlock {
                check_id,
                source: document.path.clone(),
                tests,
            }));
    } else {
        extraction.errors.extend(block_errors);
    }
}
