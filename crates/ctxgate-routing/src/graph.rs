//! Routing graph: flat node arena plus adjacency lists.
//!
//! Nodes are document keys interned to indices; traversal operates
//! over the arena rather than pointer-linked records, so cyclic
//! corpora never produce cyclic ownership.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Maximum hop distance a routed lookup may take from the root.
pub const MAX_ROUTING_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Directed document-reference graph over stable string keys.
#[derive(Debug, Clone, Default)]
pub struct RoutingGraph {
    nodes: Vec<String>,
    index: BTreeMap<String, usize>,
    adjacency: Vec<BTreeSet<usize>>,
}

impl RoutingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a document key, returning its node index.
    pub fn intern(&mut self, key: &str) -> usize {
        if let Some(&idx) = self.index.get(key) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(key.to_string());
        self.index.insert(key.to_string(), idx);
        self.adjacency.push(BTreeSet::new());
        idx
    }

    /// Add a reference edge. Self-loops are ignored: a document may
    /// reference its own anchors without creating a graph edge.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        let from_idx = self.intern(from);
        let to_idx = self.intern(to);
        self.adjacency[from_idx].insert(to_idx);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(BTreeSet::len).sum()
    }

    /// First cycle reachable from `root`, as the full key path
    /// root → … → repeated node. `None` when acyclic from the root.
    pub fn find_cycle(&self, root: &str) -> Option<Vec<String>> {
        let root_idx = *self.index.get(root)?;
        let mut color = vec![Color::White; self.nodes.len()];
        let mut path = Vec::new();
        self.dfs_cycle(root_idx, &mut color, &mut path)
            .map(|cycle| cycle.into_iter().map(|idx| self.nodes[idx].clone()).collect())
    }

    fn dfs_cycle(
        &self,
        node: usize,
        color: &mut [Color],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        color[node] = Color::Gray;
        path.push(node);

        for &next in &self.adjacency[node] {
            match color[next] {
                Color::Gray => {
                    // in-progress node closes the cycle
                    let mut cycle = path.clone();
                    cycle.push(next);
                    return Some(cycle);
                }
                Color::White => {
                    if let Some(cycle) = self.dfs_cycle(next, color, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        path.pop();
        color[node] = Color::Black;
        None
    }

    /// Minimum hop distance from `root` to every reachable node.
    pub fn depth_map(&self, root: &str) -> BTreeMap<String, usize> {
        let mut depths = BTreeMap::new();
        let Some(&root_idx) = self.index.get(root) else {
            return depths;
        };

        let mut seen = vec![false; self.nodes.len()];
        let mut queue = VecDeque::new();
        seen[root_idx] = true;
        queue.push_back((root_idx, 0usize));

        while let Some((node, depth)) = queue.pop_front() {
            depths.insert(self.nodes[node].clone(), depth);
            for &next in &self.adjacency[node] {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back((next, depth + 1));
                }
            }
        }

        depths
    }
}
