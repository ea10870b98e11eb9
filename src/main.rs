mod common;
mod config;
mod dist;
mod map;
mod scenario;
mod solver;
mod stat;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tracing::{debug, info};

use common::Instance;
use config::{Cli, Config};
use map::Map;
use scenario::Scenario;
use solver::{LaCam, LaCam2, Solver};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_yaml_str(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    }
    .override_from_command_line(&cli)?;

    let map = Map::from_file(&config.map_path)
        .with_context(|| format!("Error loading map {:?}", config.map_path))?;
    info!(
        "loaded map {}x{} with {} vertices",
        map.height,
        map.width,
        map.num_vertices()
    );

    let agents = if let Some(path) = &config.agents_yaml_path {
        Scenario::load_agents_from_yaml(path)?
    } else if let Some(path) = &config.scen_path {
        let scen = Scenario::load_from_scen(path)
            .with_context(|| format!("Error loading scenario {:?}", path))?;
        let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or(0));
        let agents = scen
            .generate_agents_randomly(config.num_agents, &mut rng)
            .map_err(anyhow::Error::msg)?;
        Scenario::write_agents_to_yaml("debug.yaml", &agents)?;
        agents
    } else {
        anyhow::bail!("either agents_yaml_path or scen_path must be set");
    };

    for agent in &agents {
        if !agent.verify(&map) {
            anyhow::bail!("agent {} has an impassable start or goal", agent.id);
        }
    }

    let instance = Instance::from_agents(&map, &agents)?;
    let rng = config.seed.map(StdRng::seed_from_u64);
    let time_limit = Duration::from_millis(config.time_limit_ms);

    info!("solve with {} ({} agents)", config.solver, agents.len());
    let (solution, additional_info) = match config.solver.as_str() {
        "lacam" => {
            let mut solver = LaCam::new(
                instance.clone(),
                config.objective,
                config.restart_rate,
                time_limit,
                rng,
            )
            .with_bound_prune(config.bound_prune);
            let solution = solver.solve();
            solver.stats().print();
            (solution, solver.additional_info())
        }
        "lacam2" => {
            let mut solver = LaCam2::new(
                instance.clone(),
                config.objective,
                config.restart_rate,
                time_limit,
                rng,
            )
            .with_swap(config.flg_swap)
            .with_bound_prune(config.bound_prune);
            let solution = solver.solve();
            solver.stats().print();
            (solution, solver.additional_info())
        }
        _ => unreachable!(),
    };

    debug!("{}", additional_info);

    match solution {
        Some(solution) => {
            if !solution.verify(&instance) {
                anyhow::bail!("produced an invalid solution");
            }
            solution.log_solution(&map, &config.solver);
            info!("makespan: {}", solution.makespan());
        }
        None => info!("failed to find a solution"),
    }

    Ok(())
}
