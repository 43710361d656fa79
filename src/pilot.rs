use rand::Rng;
use tracing::{debug, trace};

use crate::common::{Algorithm, Position};
use crate::map::{Map, Tile};
use crate::solver::PathFinder;

/// Consecutive stalled turns before the pilot changes target.
pub const MAX_STALLED_TURNS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PilotStep {
    Moved { to: Position, ate: Option<Tile> },
    Stalled,
    Cleared,
}

/// Closest pellet by straight-line distance; row-major order breaks ties.
pub fn nearest_pellet(map: &Map, from: Position) -> Option<Position> {
    let distance = |position: Position| {
        let dx = u128::from(position.x.abs_diff(from.x));
        let dy = u128::from(position.y.abs_diff(from.y));
        dx * dx + dy * dy
    };
    map.positions()
        .filter(|(_, tile)| tile.is_pellet())
        .map(|(position, _)| position)
        .min_by_key(|&position| distance(position))
}

/// First pellet in `from`'s column, then in its row, then anywhere.
pub fn any_pellet(map: &Map, from: Position) -> Option<Position> {
    let is_pellet = |position: Position| map.tile(position).is_some_and(|tile| tile.is_pellet());

    let column = (0..map.height as i32).map(|y| Position::new(from.x, y));
    let row = (0..map.width as i32).map(|x| Position::new(x, from.y));
    column.chain(row).find(|&position| is_pellet(position)).or_else(|| {
        map.positions()
            .find(|(_, tile)| tile.is_pellet())
            .map(|(position, _)| position)
    })
}

/// A uniformly chosen passable neighbour, if there is one.
pub fn random_valid_move<R: Rng + ?Sized>(map: &Map, from: Position, rng: &mut R) -> Option<Position> {
    let moves = map.get_neighbors(from);
    if moves.is_empty() {
        return None;
    }
    Some(moves[rng.gen_range(0..moves.len())])
}

/// Headless pellet chaser: searches towards the nearest pellet every turn and
/// moves one cell.
#[derive(Debug, Clone)]
pub struct Pilot {
    pub position: Position,
    pub algorithm: Algorithm,
    stalled_turns: usize,
}

impl Pilot {
    pub fn new(position: Position, algorithm: Algorithm) -> Self {
        Pilot {
            position,
            algorithm,
            stalled_turns: 0,
        }
    }

    pub fn stalled_turns(&self) -> usize {
        self.stalled_turns
    }

    /// Plays one turn. The map is only written after the search returns.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        map: &mut Map,
        finder: &PathFinder,
        rng: &mut R,
    ) -> PilotStep {
        let Some(target) = nearest_pellet(map, self.position) else {
            return PilotStep::Cleared;
        };

        let mut next = self.next_waypoint(map, finder, target);
        if next.is_none() {
            self.stalled_turns += 1;
            debug!(
                "{} stalled towards {target} ({} turns)",
                self.algorithm, self.stalled_turns
            );

            if self.stalled_turns >= MAX_STALLED_TURNS {
                self.stalled_turns = 0;
                next = any_pellet(map, self.position)
                    .and_then(|other| self.next_waypoint(map, finder, other))
                    .or_else(|| random_valid_move(map, self.position, rng));
            }
        } else {
            self.stalled_turns = 0;
        }

        let Some(to) = next else {
            return PilotStep::Stalled;
        };

        self.position = to;
        let ate = map.tile(to).filter(|tile| tile.is_pellet());
        if ate.is_some() {
            map.set_tile(to, Tile::Empty);
        }
        trace!("moved to {to}, ate {ate:?}");
        PilotStep::Moved { to, ate }
    }

    /// Second point of the search result, when it is a real single step.
    /// Fallback paths that jump across the maze do not count.
    fn next_waypoint(&self, map: &Map, finder: &PathFinder, target: Position) -> Option<Position> {
        let path = finder.find_path(map, self.position, target, self.algorithm);
        path.get(1)
            .copied()
            .filter(|&next| self.position.is_adjacent(next))
    }
}
