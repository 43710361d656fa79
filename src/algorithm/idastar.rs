use super::{
    closest_visited_fallback, heuristic, NodeId, Probe, SearchLimits, SearchTree, UNBOUNDED,
};
use crate::common::{Path, Position, SearchOutcome};
use crate::map::Map;
use crate::stat::Stats;

use std::collections::HashSet;
use tracing::{debug, instrument, trace};

struct IdaStar<'a> {
    map: &'a Map,
    goal: Position,
    limits: &'a SearchLimits,
    stats: &'a mut Stats,
    tree: SearchTree,
    // Cleared at the start of every bound iteration.
    visited: HashSet<usize>,
    trace: Vec<Position>,
    path: Path,
}

impl IdaStar<'_> {
    fn search(&mut self, id: NodeId, bound: usize, depth: usize) -> Probe {
        let position = self.tree[id].position;
        let Some(key) = self.map.index(position) else {
            return Probe::Failed(UNBOUNDED);
        };

        if !self.visited.insert(key) {
            return Probe::Failed(UNBOUNDED);
        }
        self.trace.push(position);
        self.stats.nodes_explored += 1;
        self.stats.record_memory(depth + 1);

        let f = self.tree[id].g + self.tree[id].h;
        if f > bound {
            return Probe::Failed(f);
        }

        if position == self.goal {
            self.path = self.tree.construct_path(id);
            return Probe::Found(f);
        }

        if depth >= self.limits.max_depth {
            debug!("depth guard hit at {position}");
            return Probe::Failed(UNBOUNDED);
        }

        let mut successors = self.tree.expand(self.map, id, self.goal);
        self.tree.sort_by_f(&mut successors);

        let mut min = UNBOUNDED;
        for successor in successors {
            match self.search(successor, bound, depth + 1) {
                found @ Probe::Found(_) => return found,
                Probe::Failed(cost) => min = min.min(cost),
            }
        }
        Probe::Failed(min)
    }
}

/// Iterative-deepening A* from `start` to `goal`.
///
/// Each iteration is a depth-first pass pruned at the current f bound; the
/// smallest pruned f becomes the next bound. Gives up after
/// `limits.ida_max_iterations` bounds and falls back to the closest visited
/// position.
#[instrument(skip_all, name = "ida_star", fields(start = %start, goal = %goal), level = "debug")]
pub fn ida_star_search(
    map: &Map,
    start: Position,
    goal: Position,
    limits: &SearchLimits,
    stats: &mut Stats,
) -> SearchOutcome {
    if start == goal {
        return SearchOutcome::single(start);
    }

    let mut ida = IdaStar {
        map,
        goal,
        limits,
        stats,
        tree: SearchTree::default(),
        visited: HashSet::new(),
        trace: Vec::new(),
        path: Vec::new(),
    };

    let mut bound = heuristic(start, goal);
    for iteration in 0..limits.ida_max_iterations {
        ida.stats.iterations += 1;
        ida.visited.clear();
        ida.tree.clear();

        let root = ida.tree.root(start, goal);
        match ida.search(root, bound, 0) {
            Probe::Found(cost) => {
                debug!("found with bound {bound} (cost {cost}) in iteration {iteration}");
                break;
            }
            Probe::Failed(UNBOUNDED) => {
                debug!("search space exhausted in iteration {iteration}");
                break;
            }
            Probe::Failed(next) => {
                trace!("bound {bound} -> {next}");
                bound = next;
            }
        }
    }

    let IdaStar {
        trace, mut path, ..
    } = ida;
    if path.is_empty() && !trace.is_empty() {
        path = closest_visited_fallback(start, goal, &trace);
    }

    SearchOutcome {
        path,
        visited: trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::tests::{assert_connected, init_tracing};

    fn run(map: &Map, start: Position, goal: Position) -> (SearchOutcome, Stats) {
        init_tracing();
        let mut stats = Stats::default();
        let outcome = ida_star_search(map, start, goal, &SearchLimits::default(), &mut stats);
        (outcome, stats)
    }

    #[test]
    fn test_ida_star_open_grid() {
        let map = Map::from_layout("   \n   \n   ").unwrap();
        let (outcome, stats) = run(&map, Position::new(0, 0), Position::new(2, 2));

        assert_eq!(
            outcome.path,
            vec![
                Position::new(0, 0),
                Position::new(1, 0),
                Position::new(2, 0),
                Position::new(2, 1),
                Position::new(2, 2),
            ]
        );
        // The initial bound is already the true cost.
        assert_eq!(stats.iterations, 1);
        assert!(outcome.visited.len() + 1 >= outcome.path.len());
    }

    #[test]
    fn test_ida_star_same_start_and_goal() {
        let map = Map::from_layout("   ").unwrap();
        let (outcome, stats) = run(&map, Position::new(2, 0), Position::new(2, 0));
        assert_eq!(outcome.path, vec![Position::new(2, 0)]);
        assert_eq!(stats.iterations, 0);
    }

    #[test]
    fn test_ida_star_corridor() {
        let map = Map::from_file("map_file/test/corridor.map").unwrap();
        let (outcome, _) = run(&map, Position::new(1, 1), Position::new(5, 3));

        assert_eq!(
            outcome.path,
            vec![
                Position::new(1, 1),
                Position::new(2, 1),
                Position::new(2, 2),
                Position::new(2, 3),
                Position::new(3, 3),
                Position::new(4, 3),
                Position::new(5, 3),
            ]
        );
    }

    #[test]
    fn test_ida_star_raises_bound_for_detour() {
        let map = Map::from_layout("  #  \n  #  \n     ").unwrap();
        let (outcome, stats) = run(&map, Position::new(0, 0), Position::new(4, 0));

        assert_eq!(outcome.path.len(), 9);
        assert_connected(&map, &outcome.path);
        // Bounds 4, 6 and 8.
        assert_eq!(stats.iterations, 3);
    }

    #[test]
    fn test_ida_star_unreachable_goal_falls_back() {
        let map = Map::from_layout("  #  \n  #  \n  #  ").unwrap();
        let start = Position::new(0, 1);
        let (outcome, stats) = run(&map, start, Position::new(4, 1));

        assert!(stats.iterations <= SearchLimits::default().ida_max_iterations);
        assert_eq!(outcome.path, vec![start, Position::new(1, 1)]);
    }

    #[test]
    fn test_ida_star_iteration_cap() {
        init_tracing();
        let map = Map::from_layout("  #  \n  #  \n     ").unwrap();
        let limits = SearchLimits {
            ida_max_iterations: 1,
            ..SearchLimits::default()
        };
        let mut stats = Stats::default();
        let start = Position::new(0, 0);
        let outcome = ida_star_search(&map, start, Position::new(4, 0), &limits, &mut stats);

        // Bound 4 cannot reach the goal, so the caller gets the fallback.
        assert_eq!(stats.iterations, 1);
        assert_eq!(outcome.path, vec![start, Position::new(1, 0)]);
    }
}
