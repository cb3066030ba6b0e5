//! Governance lexicon: the canonical taxonomy of routing keywords.
//!
//! Routing keywords must be registered here before use: an unknown
//! keyword is a hard failure, which is what keeps the corpus from
//! drifting into ad-hoc vocabulary as it grows. Categories carry a
//! fixed precedence used to resolve conflicts when one task condition
//! matches directives from several categories.

use ctxgate_corpus::{Annotation, Extraction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const LEXICON_CHECK_KIND: &str = "ctxgate.lexicon.check.v1";
pub const FAILURE_CLASS_KEYWORD_UNKNOWN: &str = "lexicon.keyword.unknown";

/// One registered keyword with its accepted synonyms.
#[derive(Debug, Clone, Copy)]
pub struct LexiconKeyword {
    pub canonical: &'static str,
    pub synonyms: &'static [&'static str],
}

/// A keyword category. Position in [`LEXICON`] is precedence: earlier
/// categories win conflicts.
#[derive(Debug, Clone, Copy)]
pub struct LexiconCategory {
    pub name: &'static str,
    pub keywords: &'static [LexiconKeyword],
}

macro_rules! kw {
    ($canonical:literal) => {
        LexiconKeyword {
            canonical: $canonical,
            synonyms: &[],
        }
    };
    ($canonical:literal, $($synonym:literal),+) => {
        LexiconKeyword {
            canonical: $canonical,
            synonyms: &[$($synonym),+],
        }
    };
}

/// Precedence order: security > tooling/config > architecture >
/// performance > stack-specific > general-practice.
pub const LEXICON: &[LexiconCategory] = &[
    LexiconCategory {
        name: "security",
        keywords: &[
            kw!("security", "sec"),
            kw!("authentication", "auth", "login"),
            kw!("authorization", "access-control", "permissions"),
            kw!("secrets", "credentials"),
            kw!("input-validation", "validation"),
            kw!("cryptography", "crypto"),
        ],
    },
    LexiconCategory {
        name: "tooling",
        keywords: &[
            kw!("tooling"),
            kw!("configuration", "config"),
            kw!("ci", "continuous-integration"),
            kw!("build"),
            kw!("dependencies", "deps"),
            kw!("linting", "lint"),
            kw!("formatting", "format"),
        ],
    },
    LexiconCategory {
        name: "architecture",
        keywords: &[
            kw!("architecture", "arch"),
            kw!("api-design", "api"),
            kw!("module-boundaries", "modules"),
            kw!("error-handling", "errors"),
            kw!("concurrency", "async"),
            kw!("data-model", "schema"),
        ],
    },
    LexiconCategory {
        name: "performance",
        keywords: &[
            kw!("performance", "perf"),
            kw!("caching", "cache"),
            kw!("optimization", "optimisation"),
            kw!("profiling"),
        ],
    },
    LexiconCategory {
        name: "stack-specific",
        keywords: &[
            kw!("rust"),
            kw!("javascript", "js"),
            kw!("typescript", "ts"),
            kw!("python", "py"),
            kw!("database", "db", "sql"),
            kw!("frontend", "ui"),
            kw!("backend"),
            kw!("infrastructure", "infra"),
        ],
    },
    LexiconCategory {
        name: "general-practice",
        keywords: &[
            kw!("code-style", "style"),
            kw!("naming"),
            kw!("comments"),
            kw!("documentation", "docs"),
            kw!("testing", "tests"),
            kw!("git-workflow", "git-flow"),
            kw!("code-review", "review"),
            kw!("refactoring"),
        ],
    },
];

/// Resolve a declared keyword (canonical or synonym, case-insensitive)
/// to its category and canonical form.
pub fn lookup(keyword: &str) -> Option<(&'static LexiconCategory, &'static LexiconKeyword)> {
    let needle = keyword.trim().to_ascii_lowercase();
    for category in LEXICON {
        for entry in category.keywords {
            if entry.canonical == needle
                || entry.synonyms.iter().any(|synonym| *synonym == needle)
            {
                return Some((category, entry));
            }
        }
    }
    None
}

/// The highest-precedence category among `keywords`. Unknown keywords
/// are skipped here; the lexicon check reports them separately.
pub fn dominant_category(keywords: &[String]) -> Option<&'static str> {
    keywords
        .iter()
        .filter_map(|keyword| lookup(keyword))
        .map(|(category, _)| category)
        .min_by_key(|category| precedence(category.name))
        .map(|category| category.name)
}

fn precedence(category_name: &str) -> usize {
    LEXICON
        .iter()
        .position(|category| category.name == category_name)
        .unwrap_or(usize::MAX)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LexiconFinding {
    pub source: String,
    pub class: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LexiconSummary {
    pub routing_block_count: usize,
    pub keyword_count: usize,
    pub unknown_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LexiconCheckReport {
    pub check_kind: String,
    pub result: String,
    pub failure_classes: Vec<String>,
    pub errors: Vec<LexiconFinding>,
    pub summary: LexiconSummary,
}

impl LexiconCheckReport {
    pub fn accepted(&self) -> bool {
        self.result == "accepted"
    }
}

/// Cross-check every declared routing keyword against the taxonomy.
pub fn check_lexicon(extraction: &Extraction) -> LexiconCheckReport {
    let mut errors = Vec::new();
    let mut routing_block_count = 0;
    let mut keyword_count = 0;

    for annotation in &extraction.annotations {
        let Annotation::Routing(block) = annotation else {
            continue;
        };
        routing_block_count += 1;
        for keyword in &block.keywords {
            keyword_count += 1;
            if lookup(keyword).is_none() {
                errors.push(LexiconFinding {
                    source: block.source.clone(),
                    class: FAILURE_CLASS_KEYWORD_UNKNOWN.to_string(),
                    message: format!(
                        "block {:?}: keyword {keyword:?} is not in the governance lexicon; \
                         register it before use",
                        block.check_id
                    ),
                });
            }
        }
    }

    let failure_classes = errors
        .iter()
        .map(|finding| finding.class.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let unknown_count = errors.len();
    let result = if errors.is_empty() {
        "accepted".to_string()
    } else {
        "rejected".to_string()
    };

    LexiconCheckReport {
        check_kind: LEXICON_CHECK_KIND.to_string(),
        result,
        failure_classes,
        errors,
        summary: LexiconSummary {
            routing_block_count,
            keyword_count,
            unknown_count,
        },
    }
}
