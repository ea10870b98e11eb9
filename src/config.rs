use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::common::Objective;

#[derive(Parser, Debug)]
#[command(name = "Rust LaCAM", about = "LaCAM family of MAPF algorithms implemented in Rust.", author = "Moriarty Yu", version = "1.0")]
pub struct Cli {
    #[arg(long, short, help = "Path to the YAML config file")]
    pub config: Option<String>,
}

#[derive(Serialize, Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub map_path: String,
    pub agents_yaml_path: Option<String>,
    pub scen_path: Option<String>,
    pub num_agents: usize,
    pub solver: String,
    pub objective: Objective,
    pub restart_rate: f32,
    pub time_limit_ms: u64,
    pub seed: Option<u64>,
    pub flg_swap: bool,
    pub bound_prune: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            map_path: "map_file/test/test.map".to_string(),
            agents_yaml_path: None,
            scen_path: Some("map_file/test/test.scen".to_string()),
            num_agents: 10,
            solver: "lacam2".to_string(),
            objective: Objective::None,
            restart_rate: 0.001,
            time_limit_ms: 10_000,
            seed: Some(0),
            flg_swap: true,
            bound_prune: true,
        }
    }
}

impl Config {
    pub fn from_yaml_str(config_str: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(config_str)?;
        config.validate()
    }

    pub fn override_from_command_line(self, _cli: &Cli) -> anyhow::Result<Self> {
        self.validate()
    }

    pub fn validate(self) -> anyhow::Result<Self> {
        if !(0.0..=1.0).contains(&self.restart_rate) {
            anyhow::bail!("restart_rate must lie in [0, 1]");
        }
        if self.solver != "lacam" && self.solver != "lacam2" {
            anyhow::bail!("unknown solver {:?}", self.solver);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_yaml() {
        let config = Config::from_yaml_str(
            "solver: lacam\nobjective: makespan\nrestart_rate: 0.1\nnum_agents: 4\n",
        )
        .unwrap();
        assert_eq!(config.solver, "lacam");
        assert_eq!(config.objective, Objective::Makespan);
        assert_eq!(config.num_agents, 4);
        // untouched fields keep their defaults
        assert_eq!(config.time_limit_ms, 10_000);
        assert!(config.flg_swap);
    }

    #[test]
    fn test_validate_rejects_bad_restart_rate() {
        assert!(Config::from_yaml_str("restart_rate: 1.5\n").is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_solver() {
        assert!(Config::from_yaml_str("solver: cbs\n").is_err());
    }
}
