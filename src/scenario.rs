use anyhow::Result;
use rand::prelude::*;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use tracing::info;

use crate::common::Agent;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Route {
    pub start_x: usize,
    pub start_y: usize,
    pub goal_x: usize,
    pub goal_y: usize,
}

#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub map: String,
    pub map_width: usize,
    pub map_height: usize,
    pub routes: Vec<Route>,
}

impl Scenario {
    pub fn load_from_scen(path: &str) -> io::Result<Scenario> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> io::Result<Scenario> {
        let mut lines = reader.lines().map(|line| line.unwrap());

        // First line is "version x.x" which we can skip
        let _version = lines.next().unwrap();

        let mut scenario = Scenario {
            map: String::new(),
            map_width: 0,
            map_height: 0,
            routes: Vec::new(),
        };

        for line in lines {
            let parts: Vec<&str> = line.split_whitespace().collect();

            let route = Route {
                start_x: parts[5].parse().unwrap(),
                start_y: parts[4].parse().unwrap(),
                goal_x: parts[7].parse().unwrap(),
                goal_y: parts[6].parse().unwrap(),
            };

            if scenario.map.is_empty() {
                // Initialize map details from the first route entry
                scenario.map = parts[1].to_string();
                scenario.map_width = parts[2].parse().unwrap();
                scenario.map_height = parts[3].parse().unwrap();
            }

            scenario.routes.push(route);
        }

        Ok(scenario)
    }

    pub fn generate_agents_randomly<R: Rng + ?Sized>(
        &self,
        num_agents: usize,
        rng: &mut R,
    ) -> Result<Vec<Agent>, String> {
        let mut available_routes = self.routes.clone();

        if available_routes.len() < num_agents {
            return Err(
                "Not enough unique routes available to match the number of agents".to_string(),
            );
        }

        // Shuffle the available routes to randomize the route selection
        available_routes.shuffle(rng);

        let mut agents: Vec<Agent> = Vec::new();
        for agent_id in 0..num_agents {
            let route = available_routes
                .pop()
                .ok_or("Ran out of routes unexpectedly")?;

            agents.push(Agent {
                id: agent_id,
                start: (route.start_x, route.start_y),
                goal: (route.goal_x, route.goal_y),
            });
        }

        info!("Generate scen: {agents:?}");
        Ok(agents)
    }

    pub fn load_agents_from_yaml(path: &str) -> Result<Vec<Agent>> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let agents = serde_yaml::from_reader(reader)?;
        Ok(agents)
    }

    pub fn write_agents_to_yaml(path: &str, agents: &[Agent]) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = io::BufWriter::new(file);
        let yaml_data = serde_yaml::to_string(&agents)?;
        writer.write_all(yaml_data.as_bytes())?;

        Ok(())
    }
}
