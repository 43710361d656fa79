use super::{closest_visited_fallback, NodeId, SearchLimits, SearchTree};
use crate::common::{Position, SearchOutcome};
use crate::map::Map;
use crate::stat::Stats;

use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, trace};

/// Simplified memory-bounded A* from `start` to `goal`.
///
/// The open list is re-sorted by f before every extraction (stable, so ties
/// go to the earlier entry). Whenever `|open| + |closed|` exceeds
/// `max_nodes`, the open node with the highest f is dropped (among equal f,
/// the one latest in the open list). Its f is not backed up into the parent; the
/// position only comes back if another expansion regenerates it.
#[instrument(skip_all, name = "sma_star", fields(start = %start, goal = %goal, max_nodes = max_nodes), level = "debug")]
pub fn sma_star_search(
    map: &Map,
    start: Position,
    goal: Position,
    max_nodes: usize,
    limits: &SearchLimits,
    stats: &mut Stats,
) -> SearchOutcome {
    if start == goal {
        return SearchOutcome::single(start);
    }
    let Some(start_key) = map.index(start) else {
        return SearchOutcome::default();
    };

    let mut tree = SearchTree::default();
    let mut open: Vec<NodeId> = vec![tree.root(start, goal)];
    // Position key -> node currently in `open` for that position.
    let mut open_index: HashMap<usize, NodeId> = HashMap::from([(start_key, open[0])]);
    let mut closed: HashSet<usize> = HashSet::new();
    let mut trace = Vec::new();
    let mut path = Vec::new();
    let mut iterations = 0;

    while !open.is_empty() && iterations < limits.sma_max_iterations {
        iterations += 1;
        stats.iterations += 1;

        tree.sort_by_f(&mut open);
        let current = open.remove(0);
        let position = tree[current].position;
        let Some(key) = map.index(position) else {
            continue;
        };
        open_index.remove(&key);

        if closed.contains(&key) {
            continue;
        }
        trace.push(position);
        stats.nodes_explored += 1;

        if position == goal {
            path = tree.construct_path(current);
            break;
        }

        closed.insert(key);
        for successor in tree.expand(map, current, goal) {
            let Some(successor_key) = map.index(tree[successor].position) else {
                continue;
            };
            if closed.contains(&successor_key) {
                continue;
            }

            match open_index.get(&successor_key) {
                None => {
                    open.push(successor);
                    open_index.insert(successor_key, successor);
                }
                Some(&existing) if tree[successor].g < tree[existing].g => {
                    let g = tree[successor].g;
                    let node = &mut tree[existing];
                    node.g = g;
                    node.f = g + node.h;
                    node.parent = Some(current);
                    trace!("cheaper route to {} via {position}", node.position);
                }
                Some(_) => {}
            }
        }

        stats.record_memory(open.len() + closed.len());
        if open.len() + closed.len() > max_nodes {
            // Highest f last; among equal f the later entry goes.
            tree.sort_by_f(&mut open);
            if let Some(worst) = open.pop() {
                let worst_position = tree[worst].position;
                if let Some(worst_key) = map.index(worst_position) {
                    open_index.remove(&worst_key);
                }
                trace!("memory bound {max_nodes} exceeded, dropped {worst_position}");
            }
        }
    }

    debug!(
        "finished after {iterations} iterations, {} nodes created, open {} closed {}",
        tree.len(),
        open.len(),
        closed.len()
    );

    if path.is_empty() && !trace.is_empty() {
        path = closest_visited_fallback(start, goal, &trace);
    }

    SearchOutcome {
        path,
        visited: trace,
    }
}
