use anyhow::{anyhow, bail, Context};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::common::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Empty,
    Wall,
    Pellet,
    PowerPellet,
}

impl Tile {
    pub fn is_passable(&self) -> bool {
        *self != Tile::Wall
    }

    pub fn is_pellet(&self) -> bool {
        matches!(self, Tile::Pellet | Tile::PowerPellet)
    }

    fn from_char(ch: char) -> Option<Self> {
        match ch {
            ' ' | '_' | '0' => Some(Tile::Empty),
            '#' | '1' => Some(Tile::Wall),
            '.' | '2' => Some(Tile::Pellet),
            'o' | '3' => Some(Tile::PowerPellet),
            _ => None,
        }
    }

    fn as_char(&self) -> char {
        match self {
            Tile::Empty => ' ',
            Tile::Wall => '#',
            Tile::Pellet => '.',
            Tile::PowerPellet => 'o',
        }
    }
}

/// The four orthogonal moves, in expansion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    // Successors with equal f keep this order, so it decides every tie.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }
}

/// Rectangular occupancy grid, addressed as `grid[y][x]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Map {
    pub height: usize,
    pub width: usize,
    grid: Vec<Vec<Tile>>,
}

impl Map {
    /// Builds a map from rows of tiles. Every row must have the same length.
    pub fn from_tiles(grid: Vec<Vec<Tile>>) -> anyhow::Result<Self> {
        let height = grid.len();
        let width = grid.first().map_or(0, |row| row.len());
        if let Some((y, row)) = grid.iter().enumerate().find(|(_, row)| row.len() != width) {
            bail!("row {y} has {} cells, expected {width}", row.len());
        }
        if height > 0 && width == 0 {
            bail!("map rows must not be empty");
        }
        Ok(Map {
            height,
            width,
            grid,
        })
    }

    /// Parses a bare layout, one line per row.
    pub fn from_layout(layout: &str) -> anyhow::Result<Self> {
        let rows = layout
            .lines()
            .enumerate()
            .map(|(y, line)| parse_row(y, line))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Map::from_tiles(rows)
    }

    /// Loads a maze file: a `type`/`height`/`width`/`map` header followed by
    /// `height` rows of `width` cells.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open map {path}"))?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let mut header_value = |key: &str| -> anyhow::Result<String> {
            let line = lines
                .next()
                .ok_or_else(|| anyhow!("{path}: missing `{key}` line"))??;
            let mut parts = line.split_whitespace();
            if parts.next() != Some(key) {
                bail!("{path}: expected `{key}` line, got {line:?}");
            }
            Ok(parts.collect::<Vec<_>>().join(" "))
        };

        let _type = header_value("type")?;
        let height = header_value("height")?
            .parse::<usize>()
            .with_context(|| format!("{path}: invalid height"))?;
        let width = header_value("width")?
            .parse::<usize>()
            .with_context(|| format!("{path}: invalid width"))?;
        header_value("map")?;

        let mut grid = Vec::with_capacity(height);
        for (y, line) in lines.take(height).enumerate() {
            let line = line?;
            // Editors like to strip trailing blanks, which are empty cells.
            let mut row = parse_row(y, &line)?;
            if row.len() < width {
                row.resize(width, Tile::Empty);
            }
            grid.push(row);
        }

        if grid.len() != height {
            bail!("{path}: expected {height} rows, found {}", grid.len());
        }
        let map = Map::from_tiles(grid).with_context(|| format!("{path}: malformed layout"))?;
        if map.width != width {
            bail!("{path}: expected width {width}, found {}", map.width);
        }
        Ok(map)
    }

    /// The 20x20 maze the game mode runs on.
    pub fn pacman() -> Self {
        const LAYOUT: [&str; 20] = [
            "####################",
            "#........##........#",
            "#.###.##.##.##.###.#",
            "#o# #.##.##.##.# #o#",
            "#.###.##.##.##.###.#",
            "#..................#",
            "#.###.########.###.#",
            "#.###.########.###.#",
            "#........##........#",
            "#####.## ## ##.#####",
            "    #.## ## ##.#    ",
            "    #.##    ##.#    ",
            "    #.########.#    ",
            "#####.##    ##.#####",
            "     .   ##   .     ",
            "#####.## ## ##.#####",
            "    #.## ## ##.#    ",
            "    #.## ## ##.#    ",
            "#..................#",
            "####################",
        ];
        let grid = LAYOUT
            .iter()
            .map(|row| row.chars().filter_map(Tile::from_char).collect())
            .collect();
        Map {
            height: LAYOUT.len(),
            width: LAYOUT[0].len(),
            grid,
        }
    }

    /// Random maze: each cell is a wall with probability `wall_ratio`.
    /// Positions in `keep_open` are always left empty.
    pub fn random<R: Rng + ?Sized>(
        width: usize,
        height: usize,
        wall_ratio: f64,
        keep_open: &[Position],
        rng: &mut R,
    ) -> Self {
        let grid: Vec<Vec<Tile>> = (0..height)
            .map(|_| {
                (0..width)
                    .map(|_| {
                        if rng.gen_bool(wall_ratio) {
                            Tile::Wall
                        } else {
                            Tile::Empty
                        }
                    })
                    .collect()
            })
            .collect();

        let mut map = Map {
            height,
            width,
            grid,
        };
        for &position in keep_open {
            map.set_tile(position, Tile::Empty);
        }
        map
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        position.x >= 0
            && position.y >= 0
            && (position.x as usize) < self.width
            && (position.y as usize) < self.height
    }

    pub fn tile(&self, position: Position) -> Option<Tile> {
        if !self.in_bounds(position) {
            return None;
        }
        Some(self.grid[position.y as usize][position.x as usize])
    }

    /// Out of bounds is not an error, just not passable.
    pub fn is_passable(&self, position: Position) -> bool {
        self.tile(position).is_some_and(|tile| tile.is_passable())
    }

    /// Dense `y * width + x` key, used for visited/open/closed membership.
    pub fn index(&self, position: Position) -> Option<usize> {
        self.in_bounds(position)
            .then(|| position.y as usize * self.width + position.x as usize)
    }

    /// Overwrites a cell. Returns the previous tile, or `None` when out of bounds.
    pub fn set_tile(&mut self, position: Position, tile: Tile) -> Option<Tile> {
        if !self.in_bounds(position) {
            return None;
        }
        let cell = &mut self.grid[position.y as usize][position.x as usize];
        Some(std::mem::replace(cell, tile))
    }

    pub fn neighbors4(position: Position) -> [Position; 4] {
        Direction::ALL.map(|direction| position.offset(direction.delta()))
    }

    /// Passable orthogonal neighbours, in direction order.
    pub fn get_neighbors(&self, position: Position) -> Vec<Position> {
        Map::neighbors4(position)
            .into_iter()
            .filter(|&neighbor| self.is_passable(neighbor))
            .collect()
    }

    /// All cells in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = (Position, Tile)> + '_ {
        self.grid.iter().enumerate().flat_map(|(y, row)| {
            row.iter()
                .enumerate()
                .map(move |(x, &tile)| (Position::new(x as i32, y as i32), tile))
        })
    }

    pub fn passable_positions(&self) -> Vec<Position> {
        self.positions()
            .filter(|(_, tile)| tile.is_passable())
            .map(|(position, _)| position)
            .collect()
    }

    pub fn pellet_count(&self) -> usize {
        self.positions().filter(|(_, tile)| tile.is_pellet()).count()
    }

    /// ASCII view with the visited trace (`+`), the path (`*`), start (`S`)
    /// and goal (`G`) drawn on top.
    pub fn render_search(
        &self,
        start: Position,
        goal: Position,
        visited: &[Position],
        path: &[Position],
    ) -> String {
        let mut canvas: Vec<Vec<char>> = self
            .grid
            .iter()
            .map(|row| row.iter().map(Tile::as_char).collect())
            .collect();

        let mut paint = |position: Position, ch: char| {
            if self.in_bounds(position) {
                canvas[position.y as usize][position.x as usize] = ch;
            }
        };
        for &position in visited {
            paint(position, '+');
        }
        for &position in path {
            paint(position, '*');
        }
        paint(start, 'S');
        paint(goal, 'G');

        canvas
            .into_iter()
            .map(|row| row.into_iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.grid {
            let line: String = row.iter().map(Tile::as_char).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

fn parse_row(y: usize, line: &str) -> anyhow::Result<Vec<Tile>> {
    line.chars()
        .enumerate()
        .map(|(x, ch)| {
            Tile::from_char(ch).ok_or_else(|| anyhow!("unknown cell {ch:?} at ({x}, {y})"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_read_map() {
        let map = Map::from_file("map_file/test/test.map").unwrap();

        assert_eq!(map.height, 5);
        assert_eq!(map.width, 5);

        assert!(!map.is_passable(Position::new(0, 0)));
        assert!(map.is_passable(Position::new(1, 1)));
        assert_eq!(map.tile(Position::new(1, 1)), Some(Tile::Pellet));
        assert_eq!(map.tile(Position::new(3, 3)), Some(Tile::PowerPellet));

        let neighbors = map.get_neighbors(Position::new(1, 1));
        assert_eq!(neighbors, vec![Position::new(2, 1), Position::new(1, 2)]);
    }

    #[test]
    fn test_pacman_layout() {
        let map = Map::pacman();
        assert_eq!((map.width, map.height), (20, 20));
        assert_eq!(map.tile(Position::new(1, 3)), Some(Tile::PowerPellet));
        assert_eq!(map.tile(Position::new(0, 0)), Some(Tile::Wall));
        assert_eq!(map.tile(Position::new(0, 14)), Some(Tile::Empty));
        assert!(map.pellet_count() > 100);
        assert_eq!(Map::from_file("map_file/pacman.map").unwrap(), map);
    }

    #[test]
    fn test_out_of_bounds_is_not_passable() {
        let map = Map::from_layout("  \n  ").unwrap();
        assert!(map.is_passable(Position::new(1, 1)));
        assert!(!map.is_passable(Position::new(-1, 0)));
        assert!(!map.is_passable(Position::new(2, 0)));
        assert!(!map.is_passable(Position::new(0, 2)));
        assert_eq!(map.index(Position::new(1, 1)), Some(3));
        assert_eq!(map.index(Position::new(0, 5)), None);
    }

    #[test]
    fn test_neighbors_in_direction_order() {
        let around = Map::neighbors4(Position::new(5, 5));
        assert_eq!(
            around,
            [
                Position::new(5, 4),
                Position::new(6, 5),
                Position::new(5, 6),
                Position::new(4, 5),
            ]
        );
    }

    #[test]
    fn test_ragged_layout_rejected() {
        assert!(Map::from_layout("...\n..").is_err());
        assert!(Map::from_layout("..x").is_err());
        assert!(Map::default().is_empty());
    }

    #[test]
    fn test_set_tile() {
        let mut map = Map::from_layout("..\n..").unwrap();
        assert_eq!(
            map.set_tile(Position::new(1, 0), Tile::Empty),
            Some(Tile::Pellet)
        );
        assert_eq!(map.pellet_count(), 3);
        assert_eq!(map.set_tile(Position::new(4, 0), Tile::Wall), None);
    }

    #[test]
    fn test_random_map_keeps_endpoints_open() {
        let mut rng = StdRng::seed_from_u64(7);
        let start = Position::new(2, 2);
        let goal = Position::new(12, 12);
        for _ in 0..10 {
            let map = Map::random(15, 15, 0.9, &[start, goal], &mut rng);
            assert_eq!((map.width, map.height), (15, 15));
            assert!(map.is_passable(start));
            assert!(map.is_passable(goal));
        }
    }

    #[test]
    fn test_render_search() {
        let map = Map::from_layout("   \n # \n   ").unwrap();
        let rendered = map.render_search(
            Position::new(0, 0),
            Position::new(2, 2),
            &[Position::new(0, 1)],
            &[Position::new(1, 0), Position::new(2, 0), Position::new(2, 1)],
        );
        assert_eq!(rendered, "S**\n+#*\n  G");
    }
}
