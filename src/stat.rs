use tracing::info;

use crate::common::Objective;

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub costs: u32,
    pub time_ms: u64,
    pub loop_cnt: usize,
    pub num_node_gen: usize,
    pub optimal: bool,
    pub hist_cost: Vec<u32>,
    pub hist_time: Vec<u64>,
}

impl Stats {
    pub fn print(&self) {
        info!(
            "Cost {:?} Time(ms) {:?} Search iterations {:?} Generated high level nodes {:?} Optimal {:?}",
            self.costs, self.time_ms, self.loop_cnt, self.num_node_gen, self.optimal
        );
    }

    /// Append-only key=value report consumed by benchmark scripts. Histories
    /// carry one entry per solution-cost improvement and are only written
    /// when the solver records them.
    pub fn additional_info(&self, objective: Objective, with_hist: bool) -> String {
        let mut info = String::new();
        info.push_str(&format!("optimal={}\n", self.optimal as u8));
        info.push_str(&format!("objective={}\n", objective));
        info.push_str(&format!("loop_cnt={}\n", self.loop_cnt));
        info.push_str(&format!("num_node_gen={}\n", self.num_node_gen));
        if with_hist {
            info.push_str("hist_cost=");
            for c in &self.hist_cost {
                info.push_str(&format!("{},", c));
            }
            info.push_str("\nhist_time=");
            for t in &self.hist_time {
                info.push_str(&format!("{},", t));
            }
            info.push('\n');
        }
        info
    }
}
