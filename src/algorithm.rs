mod idastar;
mod rbfs;
mod smastar;

pub use idastar::ida_star_search;
pub use rbfs::rbfs_search;
pub use smastar::sma_star_search;

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

use crate::common::{Path, Position};
use crate::map::Map;

/// Stands in for an infinite f-value.
pub const UNBOUNDED: usize = usize::MAX;

/// Caps that keep every search call bounded in time and memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    pub rbfs_max_iterations: usize,
    pub ida_max_iterations: usize,
    pub sma_max_iterations: usize,
    pub sma_max_nodes: usize,
    pub max_depth: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            rbfs_max_iterations: 1000,
            ida_max_iterations: 20,
            sma_max_iterations: 1000,
            sma_max_nodes: 100,
            max_depth: 4096,
        }
    }
}

/// Manhattan distance; admissible and consistent on a 4-connected unit grid.
pub fn heuristic(a: Position, b: Position) -> usize {
    a.x.abs_diff(b.x) as usize + a.y.abs_diff(b.y) as usize
}

/// Result of probing one subtree in RBFS and IDA*.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Found(usize),
    // Not found; carries the backed-up f-value (`UNBOUNDED` when exhausted).
    Failed(usize),
}

impl Probe {
    fn f(&self) -> usize {
        match *self {
            Probe::Found(f) | Probe::Failed(f) => f,
        }
    }

    fn is_found(&self) -> bool {
        matches!(self, Probe::Found(_))
    }
}

pub(crate) type NodeId = usize;

#[derive(Debug, Clone)]
pub(crate) struct SearchNode {
    pub(crate) position: Position,
    pub(crate) g: usize,
    pub(crate) h: usize,
    pub(crate) f: usize,
    pub(crate) parent: Option<NodeId>,
}

/// Arena holding every node one search call creates. Parent links are
/// indices into the arena, so the tree is dropped in one go with the call.
#[derive(Debug, Default)]
pub(crate) struct SearchTree {
    nodes: Vec<SearchNode>,
}

impl SearchTree {
    pub(crate) fn root(&mut self, start: Position, goal: Position) -> NodeId {
        let h = heuristic(start, goal);
        self.push(SearchNode {
            position: start,
            g: 0,
            h,
            f: h,
            parent: None,
        })
    }

    fn push(&mut self, node: SearchNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Creates the passable successors of `id`, in direction order.
    pub(crate) fn expand(&mut self, map: &Map, id: NodeId, goal: Position) -> Vec<NodeId> {
        let (position, g) = (self.nodes[id].position, self.nodes[id].g + 1);
        Map::neighbors4(position)
            .into_iter()
            .filter(|&candidate| map.is_passable(candidate))
            .map(|candidate| {
                let h = heuristic(candidate, goal);
                self.push(SearchNode {
                    position: candidate,
                    g,
                    h,
                    f: g + h,
                    parent: Some(id),
                })
            })
            .collect()
    }

    /// Stable sort by f; equal f keeps expansion order.
    pub(crate) fn sort_by_f(&self, ids: &mut [NodeId]) {
        ids.sort_by_key(|&id| self.nodes[id].f);
    }

    /// Walks parent links back to the root.
    pub(crate) fn construct_path(&self, mut current: NodeId) -> Path {
        let mut path = vec![self.nodes[current].position];
        while let Some(parent) = self.nodes[current].parent {
            path.push(self.nodes[parent].position);
            current = parent;
        }
        path.reverse();
        path
    }
}

impl Index<NodeId> for SearchTree {
    type Output = SearchNode;

    fn index(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id]
    }
}

impl IndexMut<NodeId> for SearchTree {
    fn index_mut(&mut self, id: NodeId) -> &mut SearchNode {
        &mut self.nodes[id]
    }
}

/// Best-effort two point path `[start, closest]` towards the visited
/// position with the smallest heuristic distance to `goal`. The first such
/// position in expansion order wins. Empty when nothing was visited.
pub(crate) fn closest_visited_fallback(
    start: Position,
    goal: Position,
    visited: &[Position],
) -> Path {
    visited
        .iter()
        .min_by_key(|&&position| heuristic(position, goal))
        .map(|&closest| vec![start, closest])
        .unwrap_or_default()
}
