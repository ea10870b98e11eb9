use rand::rngs::StdRng;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use super::comm::{get_edge_cost, get_h_value, HighLevelNode, StepPlanner};
use super::Solver;
use crate::common::{Config, Deadline, Instance, Objective, Solution};
use crate::dist::DistTable;
use crate::stat::Stats;
use tracing::{debug, info};

/// Enhanced LaCAM. Same two-level scheme as [`super::LaCam`] with three
/// additions: lower-bound pruning against the incumbent once a goal node is
/// known, rewiring that re-opens nodes whose f dropped below the incumbent,
/// and a corridor swap rule inside the single-step planner.
pub struct LaCam2 {
    instance: Instance,
    dist: DistTable,
    objective: Objective,
    restart_rate: f32,
    time_limit: Duration,
    rng: Option<StdRng>,
    flg_swap: bool,
    bound_prune: bool,
    stats: Stats,
}

impl LaCam2 {
    pub fn new(
        instance: Instance,
        objective: Objective,
        restart_rate: f32,
        time_limit: Duration,
        rng: Option<StdRng>,
    ) -> Self {
        let dist = DistTable::new(&instance);
        LaCam2 {
            instance,
            dist,
            objective,
            restart_rate,
            time_limit,
            rng,
            flg_swap: true,
            bound_prune: true,
            stats: Stats::default(),
        }
    }

    pub fn with_swap(mut self, flg_swap: bool) -> Self {
        self.flg_swap = flg_swap;
        self
    }

    pub fn with_bound_prune(mut self, bound_prune: bool) -> Self {
        self.bound_prune = bound_prune;
        self
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn additional_info(&self) -> String {
        self.stats.additional_info(self.objective, false)
    }

    /// Dijkstra-style relaxation over the configuration graph; a plain FIFO
    /// suffices for the near-uniform edge costs. Nodes whose f drops back
    /// under the incumbent are pushed onto the open stack again.
    fn rewrite(
        &mut self,
        nodes: &mut [HighLevelNode],
        open: &mut Vec<usize>,
        from: usize,
        to: usize,
        goal: Option<usize>,
    ) {
        nodes[from].neighbors.insert(to);
        nodes[to].neighbors.insert(from);

        let mut queue = VecDeque::from([from]);
        while let Some(u) = queue.pop_front() {
            let u_neighbors: Vec<usize> = nodes[u].neighbors.iter().copied().collect();
            for w in u_neighbors {
                let c = nodes[u].g
                    + get_edge_cost(
                        self.objective,
                        &self.instance.goals,
                        &nodes[u].config,
                        &nodes[w].config,
                    );
                if c < nodes[w].g {
                    if Some(w) == goal {
                        info!("cost update: {} -> {}", nodes[w].g, c);
                    }
                    nodes[w].g = c;
                    nodes[w].f = c + nodes[w].h;
                    nodes[w].parent = Some(u);
                    queue.push_back(w);
                    if let Some(goal_id) = goal {
                        if nodes[w].f < nodes[goal_id].f {
                            open.push(w);
                        }
                    }
                }
            }
        }
    }
}

impl Solver for LaCam2 {
    fn solve(&mut self) -> Option<Solution> {
        info!("start search");
        let deadline = Deadline::new(self.time_limit);

        let mut nodes: Vec<HighLevelNode> = Vec::new();
        let mut explored: HashMap<Config, usize> = HashMap::new();
        let mut open: Vec<usize> = Vec::new();
        let mut planner = StepPlanner::new(
            self.instance.num_agents(),
            self.instance.graph.num_vertices(),
            self.flg_swap,
        );

        // insert initial node
        let root = 0;
        let h_root = get_h_value(self.objective, &self.dist, &self.instance.starts);
        nodes.push(HighLevelNode::new(
            self.instance.starts.clone(),
            &self.dist,
            None,
            0,
            h_root,
        ));
        explored.insert(self.instance.starts.clone(), root);
        open.push(root);

        let mut goal: Option<usize> = None;

        while !open.is_empty() && !deadline.is_expired() {
            self.stats.loop_cnt += 1;

            // do not pop here
            let id = *open.last().unwrap();

            // low-level search end
            if nodes[id].search_tree.is_empty() {
                open.pop();
                continue;
            }

            // check lower bounds
            if self.bound_prune {
                if let Some(goal_id) = goal {
                    if nodes[id].f >= nodes[goal_id].f {
                        open.pop();
                        continue;
                    }
                }
            }

            // check goal condition
            if goal.is_none() && nodes[id].config == self.instance.goals {
                goal = Some(id);
                info!("found solution, cost: {}", nodes[id].g);
                if self.objective == Objective::None {
                    break;
                }
                continue;
            }

            // create successors at the low-level search
            let frame = nodes[id].search_tree.pop_front().unwrap();
            nodes[id].expand_lowlevel_tree(&self.instance.graph, &frame, &mut self.rng);

            // create successors at the high-level search
            let Some(c_new) = planner.get_new_config(
                &self.instance,
                &self.dist,
                &nodes[id].config,
                &nodes[id].order,
                &frame,
                &mut self.rng,
            ) else {
                continue;
            };

            // check explored list
            if let Some(&hit) = explored.get(&c_new) {
                // case found
                self.rewrite(&mut nodes, &mut open, id, hit, goal);
                // re-insert or random-restart
                let reinsert = match self.rng.as_mut() {
                    Some(rng) => rng.gen::<f32>() >= self.restart_rate,
                    None => true,
                };
                let push_id = if reinsert { hit } else { root };
                if goal.is_none_or(|goal_id| nodes[push_id].f < nodes[goal_id].f) {
                    open.push(push_id);
                }
            } else {
                // insert new search node
                let g = nodes[id].g
                    + get_edge_cost(
                        self.objective,
                        &self.instance.goals,
                        &nodes[id].config,
                        &c_new,
                    );
                let h = get_h_value(self.objective, &self.dist, &c_new);
                let new_id = nodes.len();
                let node = HighLevelNode::new(c_new.clone(), &self.dist, Some((id, &nodes[id])), g, h);
                nodes.push(node);
                nodes[id].neighbors.insert(new_id);
                explored.insert(c_new, new_id);
                if goal.is_none_or(|goal_id| nodes[new_id].f < nodes[goal_id].f) {
                    open.push(new_id);
                }
            }
        }

        // backtrack
        let solution = goal.map(|goal_id| {
            let mut configs = Vec::new();
            let mut cursor = Some(goal_id);
            while let Some(id) = cursor {
                configs.push(nodes[id].config.clone());
                cursor = nodes[id].parent;
            }
            configs.reverse();
            Solution { configs }
        });

        self.stats.time_ms = deadline.elapsed_ms();
        self.stats.num_node_gen = nodes.len();
        self.stats.optimal = goal.is_some() && open.is_empty();
        if let Some(goal_id) = goal {
            self.stats.costs = nodes[goal_id].g;
        }

        if goal.is_some() && open.is_empty() {
            info!("solved optimally, objective: {}", self.objective);
        } else if goal.is_some() {
            info!("solved sub-optimally, objective: {}", self.objective);
        } else if open.is_empty() {
            info!("no solution");
        } else {
            info!("timeout");
        }
        debug!("explored {} configurations", nodes.len());

        solution
    }
}
