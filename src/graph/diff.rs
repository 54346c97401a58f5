//! What a reparse did to the previous map snapshot.

use std::collections::HashSet;

use crate::graph::model::{MapGraph, NodeIndex};

/// Result of reconciling new map text against the previous graph.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReparseReport {
    /// New ids of nodes carried over from the previous snapshot.
    pub kept: Vec<u32>,
    /// New ids of nodes built with default attributes.
    pub created: Vec<u32>,
    /// Previous `(id, full_name)` of nodes the new text no longer contains.
    pub dropped: Vec<(u32, String)>,
    /// Undirected edges lost because an endpoint was dropped.
    pub pruned_edges: usize,
}

impl ReparseReport {
    pub fn is_clean(&self) -> bool {
        self.created.is_empty() && self.dropped.is_empty()
    }

    /// One-line summary for status bars.
    pub fn summary(&self) -> String {
        if self.is_clean() {
            return format!("{} nodes unchanged", self.kept.len());
        }
        let mut parts = vec![
            format!("{} new", self.created.len()),
            format!("{} dropped", self.dropped.len()),
        ];
        if self.pruned_edges > 0 {
            parts.push(format!("{} routes pruned", self.pruned_edges));
        }
        parts.join(", ")
    }
}

/// Compare `previous` with `current`.
///
/// `carried[i]` is the previous-arena index the `i`-th node of `current` was
/// reused from, or `None` for a fresh node.
pub fn compute(
    previous: &MapGraph,
    carried: &[Option<NodeIndex>],
    current: &MapGraph,
) -> ReparseReport {
    let mut report = ReparseReport::default();
    for (node, source) in current.nodes.iter().zip(carried) {
        match source {
            Some(_) => report.kept.push(node.id),
            None => report.created.push(node.id),
        }
    }

    let survivors: HashSet<NodeIndex> = carried.iter().flatten().copied().collect();
    for (idx, node) in previous.iter() {
        if !survivors.contains(&idx) {
            report.dropped.push((node.id, node.full_name.clone()));
        }
        report.pruned_edges += node
            .connections
            .iter()
            .filter(|&&other| idx < other)
            .filter(|other| !survivors.contains(&idx) || !survivors.contains(*other))
            .count();
    }
    report
}
