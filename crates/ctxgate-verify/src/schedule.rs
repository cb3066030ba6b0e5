//! Dependency scheduling: topological order over `DEPENDS_ON`.
//!
//! Depth-first post-order emission with the same three-color guard the
//! routing validator uses. A cycle (or an unknown dependency name) is
//! the one failure category that prevents partial execution: no valid
//! total order exists, so the run aborts before any test starts.

use crate::error::VerifyError;
use ctxgate_corpus::VerificationTest;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Compute the execution order as indices into `tests`.
///
/// Dependency names resolve within the declaring document: test names
/// are only unique per document, so cross-document edges would be
/// ambiguous.
pub fn schedule(tests: &[VerificationTest]) -> Result<Vec<usize>, VerifyError> {
    let mut index: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for (idx, test) in tests.iter().enumerate() {
        index.insert((test.source.as_str(), test.name.as_str()), idx);
    }

    let mut dependencies: Vec<Vec<usize>> = Vec::with_capacity(tests.len());
    for test in tests {
        let mut edges = Vec::with_capacity(test.depends_on.len());
        for dependency in &test.depends_on {
            let Some(&dep_idx) = index.get(&(test.source.as_str(), dependency.as_str())) else {
                return Err(VerifyError::UnknownDependency {
                    test: test.name.clone(),
                    source_doc: test.source.clone(),
                    dependency: dependency.clone(),
                });
            };
            edges.push(dep_idx);
        }
        dependencies.push(edges);
    }

    let mut color = vec![Color::White; tests.len()];
    let mut order = Vec::with_capacity(tests.len());
    let mut path = Vec::new();

    for start in 0..tests.len() {
        if color[start] == Color::White {
            visit(start, tests, &dependencies, &mut color, &mut path, &mut order)?;
        }
    }

    Ok(order)
}

fn visit(
    node: usize,
    tests: &[VerificationTest],
    dependencies: &[Vec<usize>],
    color: &mut [Color],
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> Result<(), VerifyError> {
    color[node] = Color::Gray;
    path.push(node);

    for &dep in &dependencies[node] {
        match color[dep] {
            Color::Gray => {
                let mut cycle: Vec<String> = path
                    .iter()
                    .map(|&idx| tests[idx].name.clone())
                    .collect();
                cycle.push(tests[dep].name.clone());
                return Err(VerifyError::DependencyCycle { path: cycle });
            }
            Color::White => {
                visit(dep, tests, dependencies, color, path, order)?;
            }
            Color::Black => {}
        }
    }

    path.pop();
    color[node] = Color::Black;
    order.push(node);
    Ok(())
}
