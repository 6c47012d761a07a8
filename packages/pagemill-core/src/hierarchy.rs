//! Forest assembly from a flat source list plus a parent/child edge list.
//!
//! Presentation-time transform only; nothing here mutates the sources'
//! persisted relationships. O(n + m): one pass to index sources by id, one
//! pass over edges to wire adjacency, then an assembly that attaches each
//! node at most once, so a cyclic or duplicated edge set degrades to a
//! partial forest instead of looping forever.

use std::collections::{HashMap, HashSet};

use crate::types::{HierarchyEdge, Source, SourceId};

/// A source with its direct children attached.
#[derive(Debug, Clone)]
pub struct SourceNode {
    pub source: Source,
    pub children: Vec<SourceNode>,
}

impl SourceNode {
    /// Nodes in this subtree, the node itself included.
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(SourceNode::subtree_size).sum::<usize>()
    }
}

/// Build a forest of sources.
///
/// Edges referencing unknown ids are dropped (debug-logged, never fatal).
/// Roots are exactly the sources that never appear as a child, in the
/// original list order.
pub fn build_forest(sources: Vec<Source>, edges: &[HierarchyEdge]) -> Vec<SourceNode> {
    let index: HashMap<SourceId, usize> = sources
        .iter()
        .enumerate()
        .map(|(position, source)| (source.id, position))
        .collect();

    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); sources.len()];
    let mut has_parent: HashSet<usize> = HashSet::new();

    for edge in edges {
        let (Some(&parent), Some(&child)) = (
            index.get(&edge.parent_source_id),
            index.get(&edge.child_source_id),
        ) else {
            tracing::debug!(
                parent = %edge.parent_source_id,
                child = %edge.child_source_id,
                "Dropping hierarchy edge with unknown endpoint"
            );
            continue;
        };
        children_of[parent].push(child);
        has_parent.insert(child);
    }

    let mut attached: HashSet<usize> = HashSet::new();
    let mut nodes: Vec<Option<Source>> = sources.into_iter().map(Some).collect();

    let roots: Vec<usize> = (0..nodes.len())
        .filter(|position| !has_parent.contains(position))
        .collect();

    roots
        .into_iter()
        .filter_map(|root| assemble(root, &children_of, &mut nodes, &mut attached))
        .collect()
}

/// Attach `position` and its descendants. The attached set guarantees each
/// node joins the forest at most once, which bounds cycles and duplicate
/// edges; recursion depth is therefore at most the source count.
fn assemble(
    position: usize,
    children_of: &[Vec<usize>],
    nodes: &mut [Option<Source>],
    attached: &mut HashSet<usize>,
) -> Option<SourceNode> {
    if !attached.insert(position) {
        // Cycle or duplicate edge: this node is already in the forest.
        return None;
    }
    let source = nodes[position].take()?;
    let mut node = SourceNode {
        source,
        children: Vec::new(),
    };
    for &child in &children_of[position] {
        if let Some(child_node) = assemble(child, children_of, nodes, attached) {
            node.children.push(child_node);
        }
    }
    Some(node)
}

/// Child → parent index, as consumed by the discovery reconciler's ancestor
/// walk. Later edges win on duplicate children.
pub fn parent_index(edges: &[HierarchyEdge]) -> HashMap<SourceId, SourceId> {
    edges
        .iter()
        .map(|edge| (edge.child_source_id, edge.parent_source_id))
        .collect()
}
