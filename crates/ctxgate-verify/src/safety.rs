//! Command safety policy.
//!
//! A fixed denylist of patterns applied to every fully-substituted
//! command before it is spawned, regardless of required/blocking
//! status. Pattern filtering is deliberately conservative: it may
//! reject a legitimate but suspiciously-worded command, and that
//! false-positive cost is accepted in exchange for needing no OS-level
//! isolation.

use regex::Regex;
use std::sync::OnceLock;

pub const GOVERNANCE_REASON_PREFIX: &str = "governance violation";

struct DenyRule {
    label: &'static str,
    pattern: &'static str,
}

const DENY_RULES: [DenyRule; 11] = [
    DenyRule {
        label: "network access",
        pattern: r"\b(?:curl|wget|nc|netcat|ssh|scp|ping)\b",
    },
    DenyRule {
        label: "structured-data query tool",
        pattern: r"\b(?:jq|yq)\b",
    },
    DenyRule {
        label: "version-control mutation",
        pattern: r"\bgit\s+(?:commit|push|merge|rebase|reset|add|rm|mv|tag|stash|checkout|cherry-pick|clean|am|apply)\b",
    },
    DenyRule {
        label: "package installation",
        pattern: r"\b(?:npm|pnpm|yarn)\s+(?:install|ci|add|i)\b",
    },
    DenyRule {
        label: "package installation",
        pattern: r"\bpip3?\s+install\b",
    },
    DenyRule {
        label: "package installation",
        pattern: r"\b(?:cargo|gem|brew)\s+install\b",
    },
    DenyRule {
        label: "package installation",
        pattern: r"\bapt(?:-get)?\s+install\b",
    },
    DenyRule {
        label: "in-place stream edit",
        pattern: r"\bsed\s+[^|;&]*-i\b",
    },
    DenyRule {
        label: "in-place stream edit",
        pattern: r"\bperl\s+[^|;&]*-i\b",
    },
    DenyRule {
        label: "filesystem mutation",
        pattern: r"\b(?:rm|mv|cp|chmod|chown|ln|dd|truncate)\b",
    },
    DenyRule {
        label: "filesystem mutation",
        pattern: r"\bmkdir\b",
    },
];

fn compiled_rules() -> &'static Vec<(&'static str, Regex)> {
    static RULES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        DENY_RULES
            .iter()
            .map(|rule| {
                (
                    rule.label,
                    Regex::new(rule.pattern).expect("denylist pattern must compile"),
                )
            })
            .collect()
    })
}

/// Why a command is denied, or `None` when the policy allows it.
///
/// Runs before the subprocess is spawned, never after.
pub fn deny_reason(command: &str) -> Option<String> {
    for (label, pattern) in compiled_rules() {
        if let Some(found) = pattern.find(command) {
            return Some(format!(
                "{GOVERNANCE_REASON_PREFIX}: {label} ({:?} matched)",
                found.as_str()
            ));
        }
    }
    None
}
