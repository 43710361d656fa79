use super::{closest_visited_fallback, NodeId, Probe, SearchLimits, SearchTree, UNBOUNDED};
use crate::common::{Path, Position, SearchOutcome};
use crate::map::Map;
use crate::stat::Stats;

use std::collections::HashSet;
use tracing::{debug, instrument, trace};

struct Rbfs<'a> {
    map: &'a Map,
    goal: Position,
    limits: &'a SearchLimits,
    stats: &'a mut Stats,
    tree: SearchTree,
    // Keyed by `Map::index`; shared by the whole call, never reset.
    visited: HashSet<usize>,
    trace: Vec<Position>,
    path: Path,
}

impl Rbfs<'_> {
    fn search(&mut self, id: NodeId, f_limit: usize, depth: usize) -> Probe {
        let position = self.tree[id].position;
        let Some(key) = self.map.index(position) else {
            return Probe::Failed(UNBOUNDED);
        };

        // A position is entered at most once per call, which keeps the
        // recursion finite at the price of never re-expanding a node.
        if !self.visited.insert(key) {
            return Probe::Failed(UNBOUNDED);
        }
        self.trace.push(position);
        self.stats.nodes_explored += 1;
        self.stats.record_memory(depth + 1);

        if position == self.goal {
            self.path = self.tree.construct_path(id);
            return Probe::Found(self.tree[id].f);
        }

        if depth >= self.limits.max_depth {
            debug!("depth guard hit at {position}");
            return Probe::Failed(UNBOUNDED);
        }

        let mut successors = self.tree.expand(self.map, id, self.goal);
        if successors.is_empty() {
            return Probe::Failed(UNBOUNDED);
        }
        self.tree.sort_by_f(&mut successors);

        let best_f = self.tree[successors[0]].f;
        if best_f > f_limit {
            return Probe::Failed(best_f);
        }

        if successors.len() == 1 {
            return self.search(successors[0], f_limit, depth + 1);
        }

        for _ in 0..self.limits.rbfs_max_iterations {
            self.stats.iterations += 1;

            let best = successors[0];
            let alternative = self.tree[successors[1]].f;
            let probe = self.search(best, f_limit.min(alternative), depth + 1);

            self.tree[best].f = probe.f();
            self.tree.sort_by_f(&mut successors);
            trace!(
                "{position}: best {} now f {}, limit {f_limit}",
                self.tree[best].position,
                probe.f()
            );

            if probe.is_found() || self.tree[successors[0]].f > f_limit {
                return probe;
            }
        }

        debug!("iteration cap reached below {position}");
        Probe::Failed(UNBOUNDED)
    }
}

/// Recursive best-first search from `start` to `goal`.
///
/// Only the best successor and the f-value of its runner-up are compared at
/// each level, so working memory stays proportional to the recursion depth.
/// When the goal is not reached, the path is the two point fallback towards
/// the visited position closest to the goal.
#[instrument(skip_all, name = "rbfs", fields(start = %start, goal = %goal), level = "debug")]
pub fn rbfs_search(
    map: &Map,
    start: Position,
    goal: Position,
    limits: &SearchLimits,
    stats: &mut Stats,
) -> SearchOutcome {
    if start == goal {
        return SearchOutcome::single(start);
    }

    let mut rbfs = Rbfs {
        map,
        goal,
        limits,
        stats,
        tree: SearchTree::default(),
        visited: HashSet::new(),
        trace: Vec::new(),
        path: Vec::new(),
    };

    let root = rbfs.tree.root(start, goal);
    let probe = rbfs.search(root, UNBOUNDED, 0);
    debug!(
        "finished: {probe:?}, {} nodes created, {} visited",
        rbfs.tree.len(),
        rbfs.trace.len()
    );

    let Rbfs {
        trace, mut path, ..
    } = rbfs;
    if !probe.is_found() && !trace.is_empty() && path.is_empty() {
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
        let outcome = rbfs_search(map, start, goal, &SearchLimits::default(), &mut stats);
        (outcome, stats)
    }

    #[test]
    fn test_rbfs_open_grid() {
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
        assert_eq!(
            outcome.visited,
            vec![
                Position::new(0, 0),
                Position::new(1, 0),
                Position::new(2, 0),
                Position::new(2, 1),
                Position::new(2, 2),
            ]
        );
        assert_eq!(stats.nodes_explored, 5);
        assert_eq!(stats.peak_memory, 5);
    }

    #[test]
    fn test_rbfs_same_start_and_goal() {
        let map = Map::from_layout("   ").unwrap();
        let (outcome, _) = run(&map, Position::new(1, 0), Position::new(1, 0));
        assert_eq!(outcome.path, vec![Position::new(1, 0)]);
        assert!(outcome.visited.is_empty());
    }

    #[test]
    fn test_rbfs_corridor() {
        let map = Map::from_file("map_file/test/corridor.map").unwrap();
        let (outcome, _) = run(&map, Position::new(1, 1), Position::new(5, 3));

        assert_eq!(outcome.path.len(), 7);
        assert_connected(&map, &outcome.path);
        assert!(outcome.visited.len() + 1 >= outcome.path.len());
    }

    #[test]
    fn test_rbfs_detour_around_wall() {
        // The direct line is blocked; the only way round is through row 2.
        let map = Map::from_layout("  #  \n  #  \n     ").unwrap();
        let (outcome, _) = run(&map, Position::new(0, 0), Position::new(4, 0));

        assert_eq!(outcome.path.first(), Some(&Position::new(0, 0)));
        assert_eq!(outcome.path.last(), Some(&Position::new(4, 0)));
        assert_eq!(outcome.path.len(), 9);
        assert_connected(&map, &outcome.path);
    }

    #[test]
    fn test_rbfs_unreachable_goal_falls_back() {
        let map = Map::from_layout("  #  \n  #  \n  #  ").unwrap();
        let start = Position::new(0, 1);
        let (outcome, _) = run(&map, start, Position::new(4, 1));

        // The left chamber is exhausted; column 1 is as close as it gets.
        assert_eq!(outcome.visited.len(), 6);
        assert_eq!(outcome.path, vec![start, Position::new(1, 1)]);
    }

    #[test]
    fn test_rbfs_iteration_cap() {
        init_tracing();
        let map = Map::from_layout("     \n     \n     \n     ").unwrap();
        let limits = SearchLimits {
            rbfs_max_iterations: 1,
            ..SearchLimits::default()
        };
        let mut stats = Stats::default();
        let start = Position::new(0, 0);
        let outcome = rbfs_search(&map, start, Position::new(4, 3), &limits, &mut stats);

        // Either reaches the goal or hands back a fallback; never hangs.
        assert!(outcome.path.len() == 2 || outcome.path.len() == 8);
        assert_eq!(outcome.path[0], start);
    }
}
