use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::map::{Graph, Map};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,
    pub start: (usize, usize),
    pub goal: (usize, usize),
}

impl Agent {
    pub fn verify(&self, map: &Map) -> bool {
        map.is_passable(self.start.0, self.start.1) && map.is_passable(self.goal.0, self.goal.1)
    }
}

/// Joint placement of all agents at one timestep; slot i holds agent i's
/// vertex id. Equality and hash are elementwise, order is significant.
pub type Config = Vec<usize>;

#[derive(Debug, Clone)]
pub struct Instance {
    pub graph: Graph,
    pub starts: Config,
    pub goals: Config,
}

impl Instance {
    pub fn new(graph: Graph, starts: Config, goals: Config) -> Self {
        assert_eq!(starts.len(), goals.len());
        Instance {
            graph,
            starts,
            goals,
        }
    }

    pub fn from_agents(map: &Map, agents: &[Agent]) -> anyhow::Result<Self> {
        let mut starts = Vec::with_capacity(agents.len());
        let mut goals = Vec::with_capacity(agents.len());
        for agent in agents {
            let s = map
                .vertex_at(agent.start.0, agent.start.1)
                .ok_or_else(|| anyhow::anyhow!("agent {} starts on a wall", agent.id))?;
            let g = map
                .vertex_at(agent.goal.0, agent.goal.1)
                .ok_or_else(|| anyhow::anyhow!("agent {} has its goal on a wall", agent.id))?;
            starts.push(s);
            goals.push(g);
        }
        Ok(Instance::new(map.to_graph(), starts, goals))
    }

    pub fn num_agents(&self) -> usize {
        self.starts.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    Makespan,
    SumOfLoss,
    None,
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::Makespan => write!(f, "makespan"),
            Objective::SumOfLoss => write!(f, "sum_of_loss"),
            Objective::None => write!(f, "none"),
        }
    }
}

/// Wall-clock limit for one `solve` call. Polled once per driver iteration;
/// a zero limit expires before the first iteration runs.
#[derive(Debug, Clone)]
pub struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn new(limit: Duration) -> Self {
        Deadline {
            start: Instant::now(),
            limit,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.start.elapsed() >= self.limit
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub configs: Vec<Config>,
}

impl Solution {
    /// Number of timesteps, i.e. transitions between configurations.
    pub fn makespan(&self) -> usize {
        self.configs.len().saturating_sub(1)
    }

    pub fn verify(&self, instance: &Instance) -> bool {
        if self.configs.is_empty() {
            error!("empty solution");
            return false;
        }

        if self.configs[0] != instance.starts {
            error!(
                "start mismatch: solution begins at {:?}, instance starts at {:?}",
                self.configs[0], instance.starts
            );
            return false;
        }
        if *self.configs.last().unwrap() != instance.goals {
            error!(
                "goal mismatch: solution ends at {:?}, instance goals are {:?}",
                self.configs.last().unwrap(),
                instance.goals
            );
            return false;
        }

        for (t, config) in self.configs.iter().enumerate() {
            let mut seen_vertices = HashSet::new();
            for (i, &v) in config.iter().enumerate() {
                if !seen_vertices.insert(v) {
                    error!("vertex conflict at timestep {t} on vertex {v}");
                    return false;
                }
                if t >= 1 {
                    let prev = self.configs[t - 1][i];
                    if prev != v && !instance.graph.neighbors(prev).contains(&v) {
                        error!("invalid move for agent {i} at timestep {t}: {prev} -> {v}");
                        return false;
                    }
                }
            }

            if t >= 1 {
                let prev_config = &self.configs[t - 1];
                for i in 0..config.len() {
                    for j in (i + 1)..config.len() {
                        if prev_config[i] == config[j] && prev_config[j] == config[i] {
                            error!(
                                "swap conflict between agents {i} and {j} at timestep {t}"
                            );
                            return false;
                        }
                    }
                }
            }
        }

        true
    }

    pub fn log_solution(&self, map: &Map, solver: &str) {
        let num_agents = self.configs.first().map_or(0, |c| c.len());
        let mut formatted_solution = String::new();
        for i in 0..num_agents {
            formatted_solution.push_str(&format!(" agent{}:\n", i));
            for (t, config) in self.configs.iter().enumerate() {
                let (x, y) = map.coord_of(config[i]);
                formatted_solution
                    .push_str(&format!("   - x: {}\n     y: {}\n     t: {}\n", x, y, t));
            }
        }
        debug!("{} solution:\n{}", solver, formatted_solution);
    }
}
