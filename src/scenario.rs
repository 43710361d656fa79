use anyhow::{bail, Context, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Write};
use tracing::info;

use crate::common::Position;
use crate::map::Map;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub start: Position,
    pub goal: Position,
    // Overrides the configured algorithm when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

/// A batch of searches to replay against one maze.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub queries: Vec<Query>,
}

impl Scenario {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open scenario {path}"))?;
        let reader = BufReader::new(file);
        let scenario = serde_yaml::from_reader(reader)
            .with_context(|| format!("failed to parse scenario {path}"))?;
        Ok(scenario)
    }

    /// Draws `num_queries` random start/goal pairs from the passable cells.
    pub fn generate_queries<R: Rng + ?Sized>(
        map: &Map,
        num_queries: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let passable = map.passable_positions();
        if passable.is_empty() {
            bail!("map has no passable cells to place queries on");
        }

        let queries: Vec<Query> = (0..num_queries)
            .map(|_| Query {
                start: passable[rng.gen_range(0..passable.len())],
                goal: passable[rng.gen_range(0..passable.len())],
                algorithm: None,
            })
            .collect();

        info!("Generate scen: {} queries", queries.len());
        Ok(Scenario { queries })
    }

    pub fn write_to_yaml(&self, path: &str) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = io::BufWriter::new(file);
        let yaml_data = serde_yaml::to_string(self)?;
        writer.write_all(yaml_data.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    #[test]
    fn test_read_scenario() {
        let scenario = Scenario::load_from_file("map_file/test/test.scen.yaml").unwrap();
        assert_eq!(
            scenario.queries,
            vec![
                Query {
                    start: Position::new(1, 1),
                    goal: Position::new(3, 3),
                    algorithm: None,
                },
                Query {
                    start: Position::new(3, 1),
                    goal: Position::new(1, 3),
                    algorithm: Some("ida-star".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_generate_queries_deterministic() {
        let map = Map::from_file("map_file/test/test.map").unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        let first = Scenario::generate_queries(&map, 5, &mut rng).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let second = Scenario::generate_queries(&map, 5, &mut rng).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.queries.len(), 5);
        for query in &first.queries {
            assert!(map.is_passable(query.start));
            assert!(map.is_passable(query.goal));
        }
    }

    #[test]
    fn test_generate_queries_needs_open_cells() {
        let map = Map::from_layout("##\n##").unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(Scenario::generate_queries(&map, 1, &mut rng).is_err());
    }

    #[test]
    fn test_write_and_reload() {
        let scenario = Scenario {
            queries: vec![Query {
                start: Position::new(0, 0),
                goal: Position::new(2, 1),
                algorithm: Some("rbfs".to_string()),
            }],
        };
        let path = std::env::temp_dir().join("pacman_search_roundtrip.scen.yaml");
        let path = path.to_str().unwrap();
        scenario.write_to_yaml(path).unwrap();
        assert_eq!(Scenario::load_from_file(path).unwrap(), scenario);
    }
}
