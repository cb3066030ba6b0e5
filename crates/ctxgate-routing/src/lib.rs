//! # ctxgate-routing
//!
//! Static validation of the document routing graph:
//! - context-check identifier uniqueness across the corpus
//! - target and anchor resolvability
//! - cycle detection and the 3-hop depth bound from the root
//! - dispatcher purity (advisory)
//! - the governance keyword lexicon
//!
//! The graph is built once, immutably, over the extracted annotations;
//! every traversal operates on a flat string-keyed arena.

pub mod graph;
pub mod lexicon;
pub mod validate;

pub use graph::{MAX_ROUTING_DEPTH, RoutingGraph};
pub use lexicon::{
    FAILURE_CLASS_KEYWORD_UNKNOWN, LEXICON, LEXICON_CHECK_KIND, LexiconCategory,
    LexiconCheckReport, LexiconFinding, LexiconKeyword, LexiconSummary, check_lexicon,
    dominant_category, lookup,
};
pub use validate::{
    FAILURE_CLASS_ANCHOR_UNRESOLVED, FAILURE_CLASS_CYCLE, FAILURE_CLASS_DEPTH_EXCEEDED,
    FAILURE_CLASS_ID_DUPLICATE, FAILURE_CLASS_ROOT_MISSING, FAILURE_CLASS_TARGET_UNRESOLVED,
    ROUTING_CHECK_KIND, RoutingCheckReport, RoutingFinding, RoutingSummary,
    WARNING_CLASS_DISPATCHER_IMPURE, check_routing,
};
