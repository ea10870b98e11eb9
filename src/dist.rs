use std::collections::VecDeque;

use crate::common::Instance;

/// Per-agent table of shortest path lengths to that agent's goal, filled by
/// one BFS per agent over the undirected graph. Vertices the goal cannot
/// reach report `|V|`, a finite sentinel exceeding any true distance.
#[derive(Debug, Clone)]
pub struct DistTable {
    table: Vec<Vec<u32>>,
}

impl DistTable {
    pub fn new(instance: &Instance) -> Self {
        let v_size = instance.graph.num_vertices();
        let mut table = vec![vec![v_size as u32; v_size]; instance.num_agents()];

        for (i, row) in table.iter_mut().enumerate() {
            let goal = instance.goals[i];
            row[goal] = 0;
            let mut queue = VecDeque::from([goal]);
            while let Some(v) = queue.pop_front() {
                let d = row[v];
                for &u in instance.graph.neighbors(v) {
                    if row[u] > d + 1 {
                        row[u] = d + 1;
                        queue.push_back(u);
                    }
                }
            }
        }

        DistTable { table }
    }

    pub fn get(&self, agent: usize, vertex: usize) -> u32 {
        self.table[agent][vertex]
    }
}
