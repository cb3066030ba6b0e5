//! Routing graph validation.
//!
//! One pass accumulates every violation across the corpus: duplicate
//! context-check identifiers, unresolvable targets and anchors, cycles,
//! depth-bound violations, and (advisory only) dispatcher purity
//! deviations.

use crate::graph::{MAX_ROUTING_DEPTH, RoutingGraph};
use ctxgate_corpus::{Annotation, Corpus, Document, Extraction};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const ROUTING_CHECK_KIND: &str = "ctxgate.routing.check.v1";

pub const FAILURE_CLASS_ID_DUPLICATE: &str = "routing.id.duplicate";
pub const FAILURE_CLASS_ROOT_MISSING: &str = "routing.root.missing";
pub const FAILURE_CLASS_TARGET_UNRESOLVED: &str = "routing.target.unresolved";
pub const FAILURE_CLASS_ANCHOR_UNRESOLVED: &str = "routing.anchor.unresolved";
pub const FAILURE_CLASS_CYCLE: &str = "routing.cycle";
pub const FAILURE_CLASS_DEPTH_EXCEEDED: &str = "routing.depth.exceeded";
pub const WARNING_CLASS_DISPATCHER_IMPURE: &str = "routing.dispatcher.impure";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutingFinding {
    pub source: String,
    pub class: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutingSummary {
    pub document_count: usize,
    pub routing_block_count: usize,
    pub edge_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutingCheckReport {
    pub check_kind: String,
    pub result: String,
    pub failure_classes: Vec<String>,
    pub warning_classes: Vec<String>,
    pub errors: Vec<RoutingFinding>,
    pub warnings: Vec<RoutingFinding>,
    pub depth_map: BTreeMap<String, usize>,
    pub summary: RoutingSummary,
}

impl RoutingCheckReport {
    pub fn accepted(&self) -> bool {
        self.result == "accepted"
    }
}

fn collect_classes(findings: &[RoutingFinding]) -> Vec<String> {
    findings
        .iter()
        .map(|finding| finding.class.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Validate the routing reference graph rooted at `root`.
///
/// Structural extraction errors are folded into the same report so a
/// single pass surfaces everything a corpus author has to fix.
pub fn check_routing(corpus: &Corpus, extraction: &Extraction, root: &str) -> RoutingCheckReport {
    let mut errors: Vec<RoutingFinding> = extraction
        .errors
        .iter()
        .map(|finding| RoutingFinding {
            source: finding.source.clone(),
            class: finding.class.clone(),
            message: finding.message.clone(),
        })
        .collect();
    let mut warnings = Vec::new();

    check_id_uniqueness(extraction, &mut errors);

    let mut graph = RoutingGraph::new();
    let mut routing_block_count = 0;

    for annotation in &extraction.annotations {
        let Annotation::Routing(block) = annotation else {
            continue;
        };
        routing_block_count += 1;
        graph.intern(&block.source);

        for request in &block.requests {
            let self_reference = request.target_path == block.source;
            let target = if self_reference {
                corpus.get(&block.source)
            } else {
                corpus.get(&request.target_path)
            };

            let Some(target_doc) = target else {
                errors.push(RoutingFinding {
                    source: block.source.clone(),
                    class: FAILURE_CLASS_TARGET_UNRESOLVED.to_string(),
                    message: format!(
                        "block {:?}: target {:?} is not a loaded document",
                        block.check_id, request.target_path
                    ),
                });
                continue;
            };

            if let Some(anchor) = &request.target_anchor
                && !target_doc.has_anchor(anchor)
            {
                errors.push(RoutingFinding {
                    source: block.source.clone(),
                    class: FAILURE_CLASS_ANCHOR_UNRESOLVED.to_string(),
                    message: format!(
                        "block {:?}: anchor {:?} matches no heading in {:?}",
                        block.check_id, anchor, request.target_path
                    ),
                });
                continue;
            }

            if !self_reference {
                graph.add_edge(&block.source, &request.target_path);
            }
        }
    }

    let mut depth_map = BTreeMap::new();
    if corpus.get(root).is_none() {
        errors.push(RoutingFinding {
            source: root.to_string(),
            class: FAILURE_CLASS_ROOT_MISSING.to_string(),
            message: format!("designated root document {root:?} is not in the corpus"),
        });
    } else {
        graph.intern(root);

        if let Some(cycle) = graph.find_cycle(root) {
            errors.push(RoutingFinding {
                source: root.to_string(),
                class: FAILURE_CLASS_CYCLE.to_string(),
                message: format!("routing cycle: {}", cycle.join(" -> ")),
            });
        }

        depth_map = graph.depth_map(root);
        for (key, depth) in &depth_map {
            if *depth > MAX_ROUTING_DEPTH {
                errors.push(RoutingFinding {
                    source: key.clone(),
                    class: FAILURE_CLASS_DEPTH_EXCEEDED.to_string(),
                    message: format!(
                        "document sits {depth} hops from {root:?}; lookups must resolve within \
                         {MAX_ROUTING_DEPTH}"
                    ),
                });
            }
        }
    }

    for document in corpus.documents() {
        if document.is_dispatcher() {
            check_dispatcher_purity(document, &mut warnings);
        }
    }

    let failure_classes = collect_classes(&errors);
    let warning_classes = collect_classes(&warnings);
    let result = if errors.is_empty() {
        "accepted".to_string()
    } else {
        "rejected".to_string()
    };
    let summary = RoutingSummary {
        document_count: corpus.len(),
        routing_block_count,
        edge_count: graph.edge_count(),
        error_count: errors.len(),
        warning_count: warnings.len(),
        max_depth: depth_map.values().max().copied(),
    };

    RoutingCheckReport {
        check_kind: ROUTING_CHECK_KIND.to_string(),
        result,
        failure_classes,
        warning_classes,
        errors,
        warnings,
        depth_map,
        summary,
    }
}

fn check_id_uniqueness(extraction: &Extraction, errors: &mut Vec<RoutingFinding>) {
    let mut locations: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for annotation in &extraction.annotations {
        locations
            .entry(annotation.check_id())
            .or_default()
            .push(annotation.source());
    }
    for (check_id, sources) in locations {
        if sources.len() > 1 {
            errors.push(RoutingFinding {
                source: sources[0].to_string(),
                class: FAILURE_CLASS_ID_DUPLICATE.to_string(),
                message: format!(
                    "context-check {check_id:?} declared {} times: {}",
                    sources.len(),
                    sources.join(", ")
                ),
            });
        }
    }
}

/// Advisory heuristic: a dispatcher must carry nothing but routing
/// machinery. Prose in a dispatcher is a smell, not a failure; the
/// heuristic has false positives on legitimate annotated routers.
fn check_dispatcher_purity(document: &Document, warnings: &mut Vec<RoutingFinding>) {
    let mut in_comment = false;
    let mut in_block = false;
    let mut top_headings = 0usize;

    for (line_no, line) in document.text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if in_comment {
            if trimmed.contains("-->") {
                in_comment = false;
            }
            continue;
        }
        if trimmed.starts_with("<!--") {
            in_comment = !trimmed.contains("-->");
            continue;
        }

        if trimmed.starts_with("<conditional-block") {
            in_block = true;
            continue;
        }
        if trimmed.starts_with("</conditional-block>") {
            in_block = false;
            continue;
        }
        if in_block {
            continue;
        }

        if trimmed.starts_with("# ") {
            top_headings += 1;
            if top_headings > 1 {
                warnings.push(RoutingFinding {
                    source: document.path.clone(),
                    class: WARNING_CLASS_DISPATCHER_IMPURE.to_string(),
                    message: format!(
                        "dispatcher carries more than one top-level heading (line {})",
                        line_no + 1
                    ),
                });
            }
            continue;
        }

        warnings.push(RoutingFinding {
            source: document.path.clone(),
            class: WARNING_CLASS_DISPATCHER_IMPURE.to_string(),
            message: format!(
                "dispatcher carries non-routing content (line {}): {:?}",
                line_no + 1,
                trimmed
            ),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxgate_corpus::{Document, extract_corpus};

    fn corpus(documents: Vec<Document>) -> Corpus {
        Corpus::from_documents(".", documents)
    }

    fn routing_doc(path: &str, check_id: &str, target: &str) -> Document {
        Document::new(
            path,
            format!(
                "# {path}\n\
                 <conditional-block context-check=\"{check_id}\" task-condition=\"security\">\n\
                 REQUEST: \"standards from {target}\"\n\
                 </conditional-block>\n"
            ),
        )
    }

    #[test]
    fn clean_two_level_graph_is_accepted() {
        let corpus = corpus(vec![
            routing_doc("root.md", "root-route", "a.md"),
            routing_doc("a.md", "a-route", "b.md"),
            Document::new("b.md", "# Leaf\n"),
        ]);
        let extraction = extract_corpus(&corpus);
        let report = check_routing(&corpus, &extraction, "root.md");
        assert!(report.accepted(), "errors: {:?}", report.errors);
        assert_eq!(report.depth_map.get("b.md"), Some(&2));
        assert_eq!(report.summary.max_depth, Some(2));
    }

    #[test]
    fn duplicate_check_id_names_both_locations() {
        let corpus = corpus(vec![
            routing_doc("root.md", "shared-id", "a.md"),
            routing_doc("a.md", "shared-id", "root.md"),
        ]);
        let extraction = extract_corpus(&corpus);
        let report = check_routing(&corpus, &extraction, "root.md");
        let duplicate = report
            .errors
            .iter()
            .find(|finding| finding.class == FAILURE_CLASS_ID_DUPLICATE)
            .expect("duplicate id violation expected");
        assert!(duplicate.message.contains("root.md"));
        assert!(duplicate.message.contains("a.md"));
    }

    #[test]
    fn mutual_reference_is_rejected_as_cycle() {
        let corpus = corpus(vec![
            routing_doc("root.md", "root-route", "a.md"),
            routing_doc("a.md", "a-route", "root.md"),
        ]);
        let extraction = extract_corpus(&corpus);
        let report = check_routing(&corpus, &extraction, "root.md");
        assert!(!report.accepted());
        let cycle = report
            .errors
            .iter()
            .find(|finding| finding.class == FAILURE_CLASS_CYCLE)
            .expect("cycle violation expected");
        assert!(cycle.message.contains("root.md"));
        assert!(cycle.message.contains("a.md"));
    }

    #[test]
    fn four_hop_path_violates_depth_bound() {
        let corpus = corpus(vec![
            routing_doc("root.md", "r0", "a.md"),
            routing_doc("a.md", "r1", "b.md"),
            routing_doc("b.md", "r2", "c.md"),
            routing_doc("c.md", "r3", "d.md"),
            Document::new("d.md", "# Deep Leaf\n"),
        ]);
        let extraction = extract_corpus(&corpus);
        let report = check_routing(&corpus, &extraction, "root.md");
        assert!(
            report
                .failure_classes
                .iter()
                .any(|class| class == FAILURE_CLASS_DEPTH_EXCEEDED)
        );
    }

    #[test]
    fn unresolved_target_and_anchor_are_reported() {
        let corpus = corpus(vec![
            routing_doc("root.md", "r0", "missing.md"),
            Document::new(
                "anchored.md",
                "# Anchored\n\
                 <conditional-block context-check=\"r1\" task-condition=\"security\">\n\
                 REQUEST: \"rules from leaf.md#no-such-heading\"\n\
                 </conditional-block>\n",
            ),
            Document::new("leaf.md", "# Leaf\n## Real Heading\n"),
        ]);
        let extraction = extract_corpus(&corpus);
        let report = check_routing(&corpus, &extraction, "root.md");
        assert!(
            report
                .failure_classes
                .iter()
                .any(|class| class == FAILURE_CLASS_TARGET_UNRESOLVED)
        );
        assert!(
            report
                .failure_classes
                .iter()
                .any(|class| class == FAILURE_CLASS_ANCHOR_UNRESOLVED)
        );
    }

    #[test]
    fn self_reference_resolves_without_an_edge() {
        let corpus = corpus(vec![Document::new(
            "root.md",
            "# Root\n\
             ## Local Rules\n\
             <conditional-block context-check=\"self\" task-condition=\"style\">\n\
             REQUEST: \"local rules from root.md#local-rules\"\n\
             </conditional-block>\n",
        )]);
        let extraction = extract_corpus(&corpus);
        let report = check_routing(&corpus, &extraction, "root.md");
        assert!(report.accepted(), "errors: {:?}", report.errors);
        assert_eq!(report.summary.edge_count, 0);
    }

    #[test]
    fn dispatcher_prose_warns_without_failing() {
        let corpus = corpus(vec![
            Document::new(
                "root.md",
                "<!-- ctxgate: dispatcher -->\n\
                 # Router\n\
                 Some stray prose that should not live in a dispatcher.\n\
                 <conditional-block context-check=\"r0\" task-condition=\"security\">\n\
                 REQUEST: \"rules from leaf.md\"\n\
                 </conditional-block>\n",
            ),
            Document::new("leaf.md", "# Leaf\n"),
        ]);
        let extraction = extract_corpus(&corpus);
        let report = check_routing(&corpus, &extraction, "root.md");
        assert!(report.accepted());
        assert!(
            report
                .warning_classes
                .iter()
                .any(|class| class == WARNING_CLASS_DISPATCHER_IMPURE)
        );
    }

    #[test]
    fn missing_root_is_a_violation() {
        let corpus = corpus(vec![Document::new("leaf.md", "# Leaf\n")]);
        let extraction = extract_corpus(&corpus);
        let report = check_routing(&corpus, &extraction, "root.md");
        assert!(
            report
                .failure_classes
                .iter()
                .any(|class| class == FAILURE_CLASS_ROOT_MISSING)
        );
    }
}
