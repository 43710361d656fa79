use pacman_search::common::{Algorithm, Position};
use pacman_search::config::{Cli, Config};
use pacman_search::map::Map;
use pacman_search::pilot::{Pilot, PilotStep};
use pacman_search::scenario::{Query, Scenario};
use pacman_search::solver::{Exploration, PathFinder};

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::BufWriter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let config = if let Some(config_file) = cli.config.as_ref() {
        let config_str = std::fs::read_to_string(config_file)
            .with_context(|| format!("failed to read config file: {config_file}"))?;
        Config::from_yaml_str(&config_str)
            .with_context(|| format!("error with config file: {config_file}"))?
    } else {
        info!("No config file specified, using default config");
        Config::default()
    }
    .override_from_command_line(&cli)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut map = load_map(&config, &mut rng)?;
    info!("Maze {}x{}, {} pellets", map.width, map.height, map.pellet_count());

    let (start, goal) = endpoints(&config, &map);
    let queries = if let Some(scenario_path) = &config.scenario_path {
        Scenario::load_from_file(scenario_path)?.queries
    } else if config.num_queries > 0 {
        Scenario::generate_queries(&map, config.num_queries, &mut rng)?.queries
    } else {
        vec![Query {
            start,
            goal,
            algorithm: None,
        }]
    };

    let finder = PathFinder::new(config.limits.clone());
    let single = queries.len() == 1;
    let mut explorations: Vec<Exploration> = Vec::new();
    for query in &queries {
        let algorithms = match &query.algorithm {
            Some(name) => vec![Algorithm::from_name(name)],
            None => config.algorithms(),
        };
        for algorithm in algorithms {
            let exploration = finder.explore(&map, query.start, query.goal, algorithm);
            exploration.stats.print(algorithm);
            if exploration.outcome.path.last() != Some(&query.goal) {
                warn!(
                    "{algorithm} did not reach {} from {}",
                    query.goal, query.start
                );
            }
            if single {
                println!("{algorithm}");
                println!(
                    "{}",
                    map.render_search(
                        query.start,
                        query.goal,
                        &exploration.outcome.visited,
                        &exploration.outcome.path,
                    )
                );
            }
            explorations.push(exploration);
        }
    }

    if config.pilot_steps > 0 {
        let algorithm = config.algorithms()[0];
        let mut pilot = Pilot::new(start, algorithm);
        let before = map.pellet_count();
        let mut turns = 0;
        while turns < config.pilot_steps {
            turns += 1;
            if pilot.step(&mut map, &finder, &mut rng) == PilotStep::Cleared {
                break;
            }
        }
        info!(
            "Pilot ({algorithm}) ate {} of {before} pellets in {turns} turns, ended at {}",
            before - map.pellet_count(),
            pilot.position
        );
    }

    if let Some(output_path) = &config.output_path {
        let file = File::create(output_path)
            .with_context(|| format!("failed to create output file: {output_path}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &explorations)?;
        info!("Wrote {} explorations to {output_path}", explorations.len());
    }

    Ok(())
}

fn load_map(config: &Config, rng: &mut StdRng) -> anyhow::Result<Map> {
    if config.maze.random {
        let (width, height) = (config.maze.width, config.maze.height);
        let (start, goal) = default_endpoints(width, height);
        let keep_open = [config.start.unwrap_or(start), config.goal.unwrap_or(goal)];
        return Ok(Map::random(
            width,
            height,
            config.maze.wall_ratio,
            &keep_open,
            rng,
        ));
    }
    match &config.map_path {
        Some(map_path) => {
            Map::from_file(map_path).with_context(|| format!("error loading map: {map_path}"))
        }
        None => Ok(Map::pacman()),
    }
}

fn endpoints(config: &Config, map: &Map) -> (Position, Position) {
    let (start, goal) = default_endpoints(map.width, map.height);
    (config.start.unwrap_or(start), config.goal.unwrap_or(goal))
}

// Inside the border wall, top-left to top-right.
fn default_endpoints(width: usize, height: usize) -> (Position, Position) {
    let row = i32::from(height > 2);
    let left = usize::from(width > 2);
    let right = width.saturating_sub(1 + left);
    (
        Position::new(left as i32, row),
        Position::new(right as i32, row),
    )
}
