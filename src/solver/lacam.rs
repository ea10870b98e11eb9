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

/// Lazy Constraints Addition search for MAPF. A depth-first search over
/// joint configurations; each node lazily expands a low-level constraint
/// tree and asks the single-step planner for one successor per iteration.
/// Anytime: after the first solution it keeps exploring for cheaper ones
/// and records a cost/time history per improvement.
pub struct LaCam {
    instance: Instance,
    dist: DistTable,
    objective: Objective,
    restart_rate: f32,
    time_limit: Duration,
    rng: Option<StdRng>,
    bound_prune: bool,
    stats: Stats,
}

impl LaCam {
    pub fn new(
        instance: Instance,
        objective: Objective,
        restart_rate: f32,
        time_limit: Duration,
        rng: Option<StdRng>,
    ) -> Self {
        let dist = DistTable::new(&instance);
        LaCam {
            instance,
            dist,
            objective,
            restart_rate,
            time_limit,
            rng,
            bound_prune: false,
            stats: Stats::default(),
        }
    }

    pub fn with_bound_prune(mut self, bound_prune: bool) -> Self {
        self.bound_prune = bound_prune;
        self
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn additional_info(&self) -> String {
        self.stats.additional_info(self.objective, true)
    }

    /// Relax g-values through the configuration graph after `from` reached
    /// `to` along a new edge. BFS order is sufficient here, the edge costs
    /// are near-uniform.
    fn rewrite(
        &mut self,
        nodes: &mut [HighLevelNode],
        from: usize,
        to: usize,
        goal: Option<usize>,
        deadline: &Deadline,
    ) {
        nodes[from].neighbors.insert(to);
        nodes[to].neighbors.insert(from);

        let c = nodes[from].g
            + get_edge_cost(
                self.objective,
                &self.instance.goals,
                &nodes[from].config,
                &nodes[to].config,
            );
        if c >= nodes[to].g {
            return; // no need to update costs
        }

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
                        self.stats.hist_cost.push(c);
                        self.stats.hist_time.push(deadline.elapsed_ms());
                    }
                    nodes[w].g = c;
                    nodes[w].f = c + nodes[w].h;
                    nodes[w].parent = Some(u);
                    queue.push_back(w);
                }
            }
        }
    }
}

impl Solver for LaCam {
    fn solve(&mut self) -> Option<Solution> {
        info!("start search");
        let deadline = Deadline::new(self.time_limit);

        let mut nodes: Vec<HighLevelNode> = Vec::new();
        let mut explored: HashMap<Config, usize> = HashMap::new();
        let mut open: Vec<usize> = Vec::new();
        let mut planner = StepPlanner::new(
            self.instance.num_agents(),
            self.instance.graph.num_vertices(),
            false,
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
                self.stats.hist_cost.push(nodes[id].g);
                self.stats.hist_time.push(deadline.elapsed_ms());
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
                self.rewrite(&mut nodes, id, hit, goal, &deadline);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Graph;
    use rand::SeedableRng;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("info")
            .try_init();
    }

    // 0-1-2-3-4
    fn path_graph() -> Graph {
        Graph::new(vec![
            vec![1],
            vec![0, 2],
            vec![1, 3],
            vec![2, 4],
            vec![3],
        ])
    }

    // cycle of `n` vertices
    fn ring_graph(n: usize) -> Graph {
        Graph::new(
            (0..n)
                .map(|i| vec![(i + n - 1) % n, (i + 1) % n])
                .collect(),
        )
    }

    fn solve_with(
        instance: Instance,
        objective: Objective,
        restart_rate: f32,
        rng: Option<StdRng>,
    ) -> (Option<Solution>, Stats) {
        let mut solver = LaCam::new(
            instance,
            objective,
            restart_rate,
            Duration::from_secs(10),
            rng,
        );
        let solution = solver.solve();
        (solution, solver.stats().clone())
    }

    #[test]
    fn test_single_agent_shortest_path() {
        init_tracing();
        let instance = Instance::new(path_graph(), vec![0], vec![4]);
        let (solution, _) = solve_with(instance.clone(), Objective::None, 0.0, None);

        let solution = solution.unwrap();
        assert!(solution.verify(&instance));
        // d(start) + 1 configurations
        assert_eq!(solution.configs.len(), 5);
    }

    #[test]
    fn test_trivial_instance() {
        init_tracing();
        // single vertex, agent already at its goal
        let graph = Graph::new(vec![vec![]]);
        let instance = Instance::new(graph, vec![0], vec![0]);
        let (solution, stats) = solve_with(instance.clone(), Objective::None, 0.0, None);

        let solution = solution.unwrap();
        assert!(solution.verify(&instance));
        assert_eq!(solution.configs, vec![vec![0]]);
        assert_eq!(stats.loop_cnt, 1);
    }

    #[test]
    fn test_starts_equal_goals() {
        init_tracing();
        let instance = Instance::new(path_graph(), vec![1, 3], vec![1, 3]);
        let (solution, _) = solve_with(instance.clone(), Objective::None, 0.0, None);

        let solution = solution.unwrap();
        assert_eq!(solution.configs, vec![vec![1, 3]]);
    }

    #[test]
    fn test_two_agent_ring_swap() {
        init_tracing();
        // on a cycle the two agents can trade ends by rotating
        let instance = Instance::new(ring_graph(5), vec![0, 2], vec![2, 0]);
        let (solution, _) = solve_with(instance.clone(), Objective::Makespan, 0.0, None);

        let solution = solution.unwrap();
        assert!(solution.verify(&instance));
        assert!(solution.makespan() <= 6);
    }

    #[test]
    fn test_corridor_with_branch() {
        init_tracing();
        // 0-1-2-3-4 with a passing pocket 5 hanging off vertex 2
        let graph = Graph::new(vec![
            vec![1],
            vec![0, 2],
            vec![1, 3, 5],
            vec![2, 4],
            vec![3],
            vec![2],
        ]);
        let instance = Instance::new(graph, vec![0, 4], vec![4, 0]);
        let (solution, _) = solve_with(instance.clone(), Objective::Makespan, 0.0, None);

        let solution = solution.unwrap();
        assert!(solution.verify(&instance));
        assert!(solution.makespan() <= 8);
    }

    #[test]
    fn test_unreachable_goal() {
        init_tracing();
        // two disconnected components {0, 1} and {2, 3}
        let graph = Graph::new(vec![vec![1], vec![0], vec![3], vec![2]]);
        let instance = Instance::new(graph, vec![0], vec![2]);
        let (solution, stats) = solve_with(instance, Objective::Makespan, 0.0, None);

        assert!(solution.is_none());
        assert!(!stats.optimal);
        assert!(stats.num_node_gen >= 1);
    }

    #[test]
    fn test_zero_deadline() {
        init_tracing();
        let instance = Instance::new(path_graph(), vec![0], vec![4]);
        let mut solver = LaCam::new(instance, Objective::Makespan, 0.0, Duration::ZERO, None);

        assert!(solver.solve().is_none());
        assert_eq!(solver.stats().loop_cnt, 0);
        assert!(!solver.stats().optimal);
    }

    #[test]
    fn test_determinism_without_rng() {
        init_tracing();
        let instance = Instance::new(ring_graph(6), vec![0, 2, 4], vec![2, 4, 0]);

        let (first, first_stats) =
            solve_with(instance.clone(), Objective::Makespan, 0.0, None);
        let (second, second_stats) =
            solve_with(instance.clone(), Objective::Makespan, 0.0, None);

        let first = first.unwrap();
        let second = second.unwrap();
        assert!(first.verify(&instance));
        assert_eq!(first.configs, second.configs);
        assert_eq!(first_stats.num_node_gen, second_stats.num_node_gen);
    }

    #[test]
    fn test_restart_rate_extremes() {
        init_tracing();
        let instance = Instance::new(ring_graph(5), vec![0, 2], vec![2, 0]);

        for restart_rate in [0.0, 1.0] {
            let rng = StdRng::seed_from_u64(7);
            let (solution, _) =
                solve_with(instance.clone(), Objective::Makespan, restart_rate, Some(rng));
            assert!(
                solution.unwrap().verify(&instance),
                "restart_rate {restart_rate} failed"
            );
        }
    }

    #[test]
    fn test_restarts_reach_optimal_classification() {
        init_tracing();
        // eight agents rotating one step around a ring
        let starts: Vec<usize> = (0..8).collect();
        let goals: Vec<usize> = (0..8).map(|i| (i + 1) % 8).collect();
        let instance = Instance::new(ring_graph(8), starts, goals);

        let rng = StdRng::seed_from_u64(0);
        let (solution, stats) = solve_with(instance.clone(), Objective::Makespan, 0.1, Some(rng));

        let solution = solution.unwrap();
        assert!(solution.verify(&instance));
        assert!(stats.optimal);
    }

    #[test]
    fn test_anytime_history_is_recorded() {
        init_tracing();
        let instance = Instance::new(ring_graph(5), vec![0, 2], vec![2, 0]);
        let (solution, stats) = solve_with(instance.clone(), Objective::Makespan, 0.0, None);

        assert!(solution.is_some());
        assert!(!stats.hist_cost.is_empty());
        assert_eq!(stats.hist_cost.len(), stats.hist_time.len());
        // histories only improve
        assert!(stats.hist_cost.windows(2).all(|w| w[1] <= w[0]));
    }
}
