use anyhow::bail;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::algorithm::{ida_star_search, rbfs_search, sma_star_search, SearchLimits};
use crate::common::{Algorithm, Path, Position, SearchOutcome};
use crate::map::Map;
use crate::stat::Stats;

/// One instrumented strategy run, as the visualizer mode reports it.
#[derive(Debug, Clone, Serialize)]
pub struct Exploration {
    pub algorithm: Algorithm,
    pub start: Position,
    pub goal: Position,
    #[serde(flatten)]
    pub outcome: SearchOutcome,
    pub stats: Stats,
}

/// Front door to the search strategies.
///
/// `find_path` never fails: bad queries, exhausted searches and faults inside
/// a strategy all come back as an empty or partial path.
#[derive(Debug, Clone, Default)]
pub struct PathFinder {
    limits: SearchLimits,
}

impl PathFinder {
    pub fn new(limits: SearchLimits) -> Self {
        PathFinder { limits }
    }

    pub fn limits(&self) -> &SearchLimits {
        &self.limits
    }

    #[instrument(skip_all, name = "find_path", fields(start = %start, goal = %goal, algorithm = %algorithm), level = "debug")]
    pub fn find_path(
        &self,
        map: &Map,
        start: Position,
        goal: Position,
        algorithm: Algorithm,
    ) -> Path {
        if let Err(err) = validate(map, start, goal) {
            debug!("rejected query: {err}");
            return Vec::new();
        }

        if start == goal {
            return vec![start];
        }

        let mut stats = Stats::default();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.dispatch(map, start, goal, algorithm, &mut stats)
        }));

        match result {
            Ok(outcome) => {
                debug!(
                    "{algorithm}: {} nodes explored, path of {}",
                    stats.nodes_explored,
                    outcome.path.len()
                );
                outcome.path
            }
            Err(_) => {
                error!("{algorithm} failed while searching from {start} to {goal}");
                Vec::new()
            }
        }
    }

    /// Runs a strategy directly, with timing. No query validation happens
    /// here: an endpoint off the map yields an empty or fallback outcome, and
    /// a start on a wall is searched from as if it were open.
    pub fn explore(
        &self,
        map: &Map,
        start: Position,
        goal: Position,
        algorithm: Algorithm,
    ) -> Exploration {
        let mut stats = Stats::default();
        let started = Instant::now();
        let outcome = self.dispatch(map, start, goal, algorithm, &mut stats);
        stats.time_us = started.elapsed().as_micros() as usize;
        stats.path_length = outcome.path.len();

        Exploration {
            algorithm,
            start,
            goal,
            outcome,
            stats,
        }
    }

    fn dispatch(
        &self,
        map: &Map,
        start: Position,
        goal: Position,
        algorithm: Algorithm,
        stats: &mut Stats,
    ) -> SearchOutcome {
        match algorithm {
            Algorithm::Rbfs => rbfs_search(map, start, goal, &self.limits, stats),
            Algorithm::IdaStar => ida_star_search(map, start, goal, &self.limits, stats),
            Algorithm::SmaStar => sma_star_search(
                map,
                start,
                goal,
                self.limits.sma_max_nodes,
                &self.limits,
                stats,
            ),
        }
    }
}

/// Path Service with the default limits.
pub fn find_path(map: &Map, start: Position, goal: Position, algorithm: Algorithm) -> Path {
    PathFinder::default().find_path(map, start, goal, algorithm)
}

fn validate(map: &Map, start: Position, goal: Position) -> anyhow::Result<()> {
    if map.is_empty() {
        bail!("map is empty");
    }
    for (name, position) in [("start", start), ("goal", goal)] {
        if !map.in_bounds(position) {
            bail!("{name} {position} is outside the {}x{} map", map.width, map.height);
        }
        if !map.is_passable(position) {
            bail!("{name} {position} is a wall");
        }
    }
    Ok(())
}
