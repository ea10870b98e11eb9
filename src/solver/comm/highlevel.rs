use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::{BTreeSet, VecDeque};

use super::Constraint;
use crate::common::{Config, Objective};
use crate::dist::DistTable;
use crate::map::Graph;

/// One explored joint configuration. Nodes live in an arena (`Vec` indexed
/// by creation order) and reference each other by index, so the undirected
/// neighbor relation over configurations needs no shared ownership.
/// Neighbors are kept in a `BTreeSet` so cost rewiring relaxes them in a
/// reproducible order.
#[derive(Debug, Clone)]
pub(crate) struct HighLevelNode {
    pub(crate) config: Config,
    pub(crate) parent: Option<usize>,
    pub(crate) neighbors: BTreeSet<usize>,
    pub(crate) g: u32,
    pub(crate) h: u32,
    pub(crate) f: u32,
    pub(crate) priorities: Vec<f32>,
    pub(crate) order: Vec<usize>,
    pub(crate) search_tree: VecDeque<Constraint>,
}

impl HighLevelNode {
    pub(crate) fn new(
        config: Config,
        dist: &DistTable,
        parent: Option<(usize, &HighLevelNode)>,
        g: u32,
        h: u32,
    ) -> Self {
        let num_agents = config.len();

        let mut priorities = vec![0.0f32; num_agents];
        match parent {
            None => {
                for (i, p) in priorities.iter_mut().enumerate() {
                    *p = dist.get(i, config[i]) as f32 / num_agents as f32;
                }
            }
            Some((_, parent_node)) => {
                // dynamic priorities, akin to PIBT: agents still away from
                // their goal climb, arrived agents drop to their fraction
                for (i, p) in priorities.iter_mut().enumerate() {
                    *p = if dist.get(i, config[i]) != 0 {
                        parent_node.priorities[i] + 1.0
                    } else {
                        parent_node.priorities[i] - parent_node.priorities[i].floor()
                    };
                }
            }
        }

        let mut order: Vec<usize> = (0..num_agents).collect();
        order.sort_by(|&i, &j| priorities[j].total_cmp(&priorities[i]));

        let mut search_tree = VecDeque::new();
        search_tree.push_back(Constraint::root());

        HighLevelNode {
            config,
            parent: parent.map(|(id, _)| id),
            neighbors: BTreeSet::new(),
            g,
            h,
            f: g + h,
            priorities,
            order,
            search_tree,
        }
    }

    /// Enqueue the dequeued frame's children: one frame per candidate next
    /// vertex for the next agent in priority order.
    pub(crate) fn expand_lowlevel_tree(
        &mut self,
        graph: &Graph,
        frame: &Constraint,
        rng: &mut Option<StdRng>,
    ) {
        if frame.depth() >= self.config.len() {
            return;
        }
        let i = self.order[frame.depth()];
        let mut candidates: Vec<usize> = graph.neighbors(self.config[i]).to_vec();
        candidates.push(self.config[i]);
        if let Some(rng) = rng {
            candidates.shuffle(rng);
        }
        for v in candidates {
            self.search_tree.push_back(frame.child(i, v));
        }
    }
}

pub(crate) fn get_edge_cost(
    objective: Objective,
    goals: &Config,
    c1: &Config,
    c2: &Config,
) -> u32 {
    match objective {
        Objective::Makespan => 1,
        Objective::SumOfLoss => c1
            .iter()
            .zip(c2)
            .enumerate()
            .filter(|&(i, (&v1, &v2))| v1 != goals[i] || v2 != goals[i])
            .count() as u32,
        Objective::None => c1.iter().zip(c2).filter(|&(v1, v2)| v1 != v2).count() as u32,
    }
}

pub(crate) fn get_h_value(objective: Objective, dist: &DistTable, config: &Config) -> u32 {
    match objective {
        Objective::Makespan => config
            .iter()
            .enumerate()
            .map(|(i, &v)| dist.get(i, v))
            .max()
            .unwrap_or(0),
        // sum of distances; None has no admissibility requirement
        Objective::SumOfLoss | Objective::None => config
            .iter()
            .enumerate()
            .map(|(i, &v)| dist.get(i, v))
            .sum(),
    }
}
