use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// A grid cell address: `x` is the column, `y` the row.
///
/// Signed so that callers may hand in positions outside the maze; those are
/// simply not passable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }

    pub fn offset(self, (dx, dy): (i32, i32)) -> Self {
        Position {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// True when `other` is exactly one orthogonal step away.
    pub fn is_adjacent(self, other: Position) -> bool {
        matches!(
            (self.x.abs_diff(other.x), self.y.abs_diff(other.y)),
            (0, 1) | (1, 0)
        )
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Position { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// Accepts "x,y" as given on the command line.
impl FromStr for Position {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| anyhow!("expected a position as `x,y`, got {s:?}"))?;
        let x = x
            .trim()
            .parse::<i32>()
            .with_context(|| format!("invalid column in position {s:?}"))?;
        let y = y
            .trim()
            .parse::<i32>()
            .with_context(|| format!("invalid row in position {s:?}"))?;
        Ok(Position { x, y })
    }
}

/// Ordered positions from start to goal, start inclusive. Empty means no path.
pub type Path = Vec<Position>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    Rbfs,
    IdaStar,
    SmaStar,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::Rbfs, Algorithm::IdaStar, Algorithm::SmaStar];

    /// Resolves an algorithm by name. Unknown names fall back to SMA*.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "rbfs" => Algorithm::Rbfs,
            "ida*" | "ida-star" | "ida_star" | "idastar" => Algorithm::IdaStar,
            "sma*" | "sma-star" | "sma_star" | "smastar" => Algorithm::SmaStar,
            other => {
                warn!("unknown algorithm {other:?}, falling back to SMA*");
                Algorithm::SmaStar
            }
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::Rbfs => "RBFS",
            Algorithm::IdaStar => "IDA*",
            Algorithm::SmaStar => "SMA*",
        };
        f.write_str(name)
    }
}

/// What a single strategy run produces: the path (possibly a partial
/// fallback, possibly empty) and the positions in expansion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    pub path: Path,
    pub visited: Vec<Position>,
}

impl SearchOutcome {
    pub(crate) fn single(start: Position) -> Self {
        SearchOutcome {
            path: vec![start],
            visited: Vec::new(),
        }
    }
}
