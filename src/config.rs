use anyhow::{anyhow, bail};
use clap::Parser;
use serde::Deserialize;

use crate::algorithm::SearchLimits;
use crate::common::{Algorithm, Position};

#[derive(Parser, Debug, Default)]
#[command(
    name = "Pacman Search",
    about = "Memory-bounded informed search (RBFS, IDA*, SMA*) on Pacman mazes.",
    version = "1.0"
)]
pub struct Cli {
    #[arg(long, help = "Path to a YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Path to the maze file (defaults to the built-in maze)")]
    pub map_path: Option<String>,

    #[arg(long, help = "Algorithm to run: rbfs, ida-star, sma-star or all")]
    pub algorithm: Option<String>,

    #[arg(long, help = "Start position as x,y")]
    pub start: Option<Position>,

    #[arg(long, help = "Goal position as x,y")]
    pub goal: Option<Position>,

    #[arg(long, help = "Node budget for SMA*")]
    pub max_nodes: Option<usize>,

    #[arg(long, help = "Seed for the random number generator")]
    pub seed: Option<u64>,

    #[arg(long, help = "Search a randomly generated maze instead of a maze file")]
    pub random_maze: bool,

    #[arg(long, help = "Width of the random maze")]
    pub width: Option<usize>,

    #[arg(long, help = "Height of the random maze")]
    pub height: Option<usize>,

    #[arg(long, help = "Probability that a random maze cell is a wall")]
    pub wall_ratio: Option<f64>,

    #[arg(long, help = "Path to a YAML scenario of queries to replay")]
    pub scenario_path: Option<String>,

    #[arg(long, help = "Number of random queries to generate when no scenario is given")]
    pub num_queries: Option<usize>,

    #[arg(long, help = "Let the pilot chase pellets for this many turns")]
    pub pilot_steps: Option<usize>,

    #[arg(long, help = "Write explorations as JSON to this file")]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MazeConfig {
    pub random: bool,
    pub width: usize,
    pub height: usize,
    pub wall_ratio: f64,
}

impl Default for MazeConfig {
    fn default() -> Self {
        MazeConfig {
            random: false,
            width: 15,
            height: 15,
            wall_ratio: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub map_path: Option<String>,
    pub algorithm: String,
    pub start: Option<Position>,
    pub goal: Option<Position>,
    pub limits: SearchLimits,
    pub maze: MazeConfig,
    pub seed: u64,
    pub scenario_path: Option<String>,
    pub num_queries: usize,
    pub pilot_steps: usize,
    pub output_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            map_path: None,
            algorithm: "all".to_string(),
            start: None,
            goal: None,
            limits: SearchLimits::default(),
            maze: MazeConfig::default(),
            seed: 0,
            scenario_path: None,
            num_queries: 0,
            pilot_steps: 0,
            output_path: None,
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(map_path) = &cli.map_path {
            self.map_path = Some(map_path.clone());
        }
        if let Some(algorithm) = &cli.algorithm {
            self.algorithm = algorithm.clone();
        }
        if cli.start.is_some() {
            self.start = cli.start;
        }
        if cli.goal.is_some() {
            self.goal = cli.goal;
        }
        if let Some(max_nodes) = cli.max_nodes {
            self.limits.sma_max_nodes = max_nodes;
        }
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        if cli.random_maze {
            self.maze.random = true;
        }
        if let Some(width) = cli.width {
            self.maze.width = width;
        }
        if let Some(height) = cli.height {
            self.maze.height = height;
        }
        if let Some(wall_ratio) = cli.wall_ratio {
            self.maze.wall_ratio = wall_ratio;
        }
        if let Some(scenario_path) = &cli.scenario_path {
            self.scenario_path = Some(scenario_path.clone());
        }
        if let Some(num_queries) = cli.num_queries {
            self.num_queries = num_queries;
        }
        if let Some(pilot_steps) = cli.pilot_steps {
            self.pilot_steps = pilot_steps;
        }
        if let Some(output_path) = &cli.output_path {
            self.output_path = Some(output_path.clone());
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let limits = &self.limits;
        if limits.sma_max_nodes < 1 {
            bail!("SMA* node budget must be at least 1, got {}", limits.sma_max_nodes);
        }
        for (name, value) in [
            ("rbfs_max_iterations", limits.rbfs_max_iterations),
            ("ida_max_iterations", limits.ida_max_iterations),
            ("sma_max_iterations", limits.sma_max_iterations),
            ("max_depth", limits.max_depth),
        ] {
            if value < 1 {
                bail!("{name} must be at least 1, got {value}");
            }
        }

        if self.maze.random {
            if self.maze.width < 1 || self.maze.height < 1 {
                bail!(
                    "random maze must be at least 1x1, got {}x{}",
                    self.maze.width,
                    self.maze.height
                );
            }
            if !(0.0..1.0).contains(&self.maze.wall_ratio) {
                return Err(anyhow!(
                    "Wall ratio must be in [0, 1), got {}",
                    self.maze.wall_ratio
                ));
            }
        }
        Ok(())
    }

    /// Algorithms selected by `algorithm`; `all` runs every strategy.
    pub fn algorithms(&self) -> Vec<Algorithm> {
        if self.algorithm.trim().eq_ignore_ascii_case("all") {
            Algorithm::ALL.to_vec()
        } else {
            vec![Algorithm::from_name(&self.algorithm)]
        }
    }
}
