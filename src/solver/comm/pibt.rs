use rand::rngs::StdRng;
use rand::Rng;

use super::Constraint;
use crate::common::{Config, Instance};
use crate::dist::DistTable;

/// Single-step joint-action planner: given a configuration, a processing
/// order, and a partial constraint frame, produce a collision-free successor
/// configuration via priority inheritance with backtracking, or fail.
///
/// All buffers are scratch reused across invocations; `get_new_config`
/// fully resets the entries touched by the previous call before planning.
/// One planner instance serves one search; a concurrent search needs its own.
pub(crate) struct StepPlanner {
    num_agents: usize,
    flg_swap: bool,
    v_now: Vec<usize>,
    v_next: Vec<Option<usize>>,
    occupied_now: Vec<Option<usize>>,
    occupied_next: Vec<Option<usize>>,
    candidates: Vec<Vec<usize>>,
    tie_breakers: Vec<f32>,
}

impl StepPlanner {
    pub(crate) fn new(num_agents: usize, v_size: usize, flg_swap: bool) -> Self {
        StepPlanner {
            num_agents,
            flg_swap,
            v_now: vec![0; num_agents],
            v_next: vec![None; num_agents],
            occupied_now: vec![None; v_size],
            occupied_next: vec![None; v_size],
            candidates: vec![Vec::new(); num_agents],
            tie_breakers: vec![0.0; v_size],
        }
    }

    pub(crate) fn get_new_config(
        &mut self,
        instance: &Instance,
        dist: &DistTable,
        config: &Config,
        order: &[usize],
        frame: &Constraint,
        rng: &mut Option<StdRng>,
    ) -> Option<Config> {
        // clear the previous invocation's marks, then set occupied_now
        for i in 0..self.num_agents {
            let v = self.v_now[i];
            if self.occupied_now[v] == Some(i) {
                self.occupied_now[v] = None;
            }
            if let Some(v) = self.v_next[i].take() {
                self.occupied_next[v] = None;
            }
        }
        for (i, &v) in config.iter().enumerate() {
            self.v_now[i] = v;
            self.occupied_now[v] = Some(i);
        }

        // install the frame's constraints, root to leaf
        for k in 0..frame.depth() {
            let i = frame.who[k];
            let l = frame.locations[k];

            // check vertex collision
            if self.occupied_next[l].is_some() {
                return None;
            }
            // check swap collision
            let l_pre = config[i];
            if let (Some(a), Some(b)) = (self.occupied_next[l_pre], self.occupied_now[l]) {
                if a == b {
                    return None;
                }
            }

            self.v_next[i] = Some(l);
            self.occupied_next[l] = Some(i);
        }

        // perform PIBT for the unconstrained agents
        for &k in order {
            if self.v_next[k].is_none() && !self.func_pibt(k, None, instance, dist, rng) {
                return None; // planning failure
            }
        }

        Some(self.v_next.iter().map(|v| v.unwrap()).collect())
    }

    fn func_pibt(
        &mut self,
        ai: usize,
        aj: Option<usize>,
        instance: &Instance,
        dist: &DistTable,
        rng: &mut Option<StdRng>,
    ) -> bool {
        let v_now = self.v_now[ai];

        // candidates for the next location: neighbors plus stay
        let mut candidates: Vec<usize> = instance.graph.neighbors(v_now).to_vec();
        candidates.push(v_now);
        if let Some(rng) = rng.as_mut() {
            for &u in &candidates {
                self.tie_breakers[u] = rng.gen::<f32>();
            }
        }
        candidates.sort_by(|&v, &u| {
            (dist.get(ai, v) as f32 + self.tie_breakers[v])
                .total_cmp(&(dist.get(ai, u) as f32 + self.tie_breakers[u]))
        });
        self.candidates[ai] = candidates;

        let mut swap_agent = None;
        if self.flg_swap {
            swap_agent = self.swap_possible_and_required(ai, instance, dist);
            if swap_agent.is_some() {
                self.candidates[ai].reverse();
            }
        }

        // main operation
        for k in 0..self.candidates[ai].len() {
            let u = self.candidates[ai][k];

            // avoid vertex conflicts
            if self.occupied_next[u].is_some() {
                continue;
            }
            // avoid swapping with the calling agent
            if aj.is_some_and(|aj| u == self.v_now[aj]) {
                continue;
            }

            let ak = self.occupied_now[u];

            // avoid head-on swap conflicts
            if ak.is_some_and(|ak| self.v_next[ak] == Some(v_now)) {
                continue;
            }

            // reserve next location
            self.occupied_next[u] = Some(ai);
            self.v_next[ai] = Some(u);

            // priority inheritance
            if let Some(ak) = ak {
                if u != v_now
                    && ak != ai
                    && self.v_next[ak].is_none()
                    && !self.func_pibt(ak, Some(ai), instance, dist, rng)
                {
                    continue;
                }
            }

            // success; pull the swap partner along when applicable
            if self.flg_swap && k == 0 {
                if let Some(sa) = swap_agent {
                    if self.v_next[sa].is_none() && self.occupied_next[v_now].is_none() {
                        self.v_next[sa] = Some(v_now);
                        self.occupied_next[v_now] = Some(sa);
                    }
                }
            }
            return true;
        }

        // failed to secure a vertex, stay put
        self.occupied_next[v_now] = Some(ai);
        self.v_next[ai] = Some(v_now);
        false
    }

    /// Returns the agent to pull through a corridor swap, if the best
    /// candidate is blocked in a way plain inheritance cannot untangle.
    fn swap_possible_and_required(
        &self,
        ai: usize,
        instance: &Instance,
        dist: &DistTable,
    ) -> Option<usize> {
        let v_now = self.v_now[ai];
        let best = self.candidates[ai][0];
        if best == v_now {
            return None;
        }

        // usual swap situation: the best candidate is held by an idle agent
        if let Some(aj) = self.occupied_now[best] {
            if self.v_next[aj].is_none()
                && self.is_swap_required(ai, aj, v_now, self.v_now[aj], instance, dist)
                && self.is_swap_possible(self.v_now[aj], v_now, instance)
            {
                return Some(aj);
            }
        }

        // clear operation: a neighbor needs to swap through ai's position
        for &u in instance.graph.neighbors(v_now) {
            if let Some(ak) = self.occupied_now[u] {
                if best == self.v_now[ak] {
                    continue;
                }
                if self.is_swap_required(ak, ai, v_now, best, instance, dist)
                    && self.is_swap_possible(best, v_now, instance)
                {
                    return Some(ak);
                }
            }
        }

        None
    }

    /// Walk the corridor ahead of the pusher; a swap is required when it
    /// never branches and the distance relations put the puller in the way.
    fn is_swap_required(
        &self,
        pusher: usize,
        puller: usize,
        v_pusher_origin: usize,
        v_puller_origin: usize,
        instance: &Instance,
        dist: &DistTable,
    ) -> bool {
        let mut v_pusher = v_pusher_origin;
        let mut v_puller = v_puller_origin;
        while dist.get(pusher, v_puller) < dist.get(pusher, v_pusher) {
            let mut n = instance.graph.degree(v_puller);
            let mut live = None;
            for &u in instance.graph.neighbors(v_puller) {
                let a = self.occupied_now[u];
                if u == v_pusher
                    || (instance.graph.degree(u) == 1
                        && a.is_some_and(|a| instance.goals[a] == u))
                {
                    // pusher's own cell, or a dead end parked on by its owner
                    n -= 1;
                } else {
                    live = Some(u);
                }
            }
            if n >= 2 {
                return false; // corridor branches, no swap needed
            }
            match live {
                None => break,
                Some(u) => {
                    v_pusher = v_puller;
                    v_puller = u;
                }
            }
        }

        // judge based on distance
        dist.get(puller, v_pusher) < dist.get(puller, v_puller)
            && (dist.get(pusher, v_pusher) == 0
                || dist.get(pusher, v_puller) < dist.get(pusher, v_pusher))
    }

    /// Walk the corridor behind the pusher; the swap is possible when the
    /// corridor opens up before the walk cycles back.
    fn is_swap_possible(
        &self,
        v_pusher_origin: usize,
        v_puller_origin: usize,
        instance: &Instance,
    ) -> bool {
        let mut v_pusher = v_pusher_origin;
        let mut v_puller = v_puller_origin;
        while v_puller != v_pusher_origin {
            let mut n = instance.graph.degree(v_puller);
            let mut live = None;
            for &u in instance.graph.neighbors(v_puller) {
                let a = self.occupied_now[u];
                if u == v_pusher
                    || (instance.graph.degree(u) == 1
                        && a.is_some_and(|a| instance.goals[a] == u))
                {
                    n -= 1;
                } else {
                    live = Some(u);
                }
            }
            if n >= 2 {
                return true;
            }
            match live {
                None => return false,
                Some(u) => {
                    v_pusher = v_puller;
                    v_puller = u;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Graph;

    // 0-1-2-3-4
    fn path_instance() -> Instance {
        let graph = Graph::new(vec![
            vec![1],
            vec![0, 2],
            vec![1, 3],
            vec![2, 4],
            vec![3],
        ]);
        Instance::new(graph, vec![0, 4], vec![4, 0])
    }

    #[test]
    fn test_unconstrained_step_moves_toward_goals() {
        let instance = path_instance();
        let dist = DistTable::new(&instance);
        let mut planner = StepPlanner::new(2, 5, false);

        let config = planner.get_new_config(
            &instance,
            &dist,
            &vec![0, 4],
            &[0, 1],
            &Constraint::root(),
            &mut None,
        );
        assert_eq!(config, Some(vec![1, 3]));
    }

    #[test]
    fn test_head_on_agents_do_not_swap() {
        let instance = path_instance();
        let dist = DistTable::new(&instance);
        let mut planner = StepPlanner::new(2, 5, false);

        // adjacent and facing each other; any produced step must be collision-free
        let config = planner.get_new_config(
            &instance,
            &dist,
            &vec![2, 3],
            &[0, 1],
            &Constraint::root(),
            &mut None,
        );
        if let Some(config) = config {
            assert_ne!(config[0], config[1]);
            assert!(!(config[0] == 3 && config[1] == 2));
        }
    }

    #[test]
    fn test_constraint_vertex_conflict_rejected() {
        let instance = path_instance();
        let dist = DistTable::new(&instance);
        let mut planner = StepPlanner::new(2, 5, false);

        // both agents pinned to vertex 2
        let frame = Constraint::root().child(0, 2).child(1, 2);
        let config = planner.get_new_config(
            &instance,
            &dist,
            &vec![1, 3],
            &[0, 1],
            &frame,
            &mut None,
        );
        assert_eq!(config, None);
    }

    #[test]
    fn test_constraint_swap_conflict_rejected() {
        let instance = path_instance();
        let dist = DistTable::new(&instance);
        let mut planner = StepPlanner::new(2, 5, false);

        // agents at 1 and 2 pinned to trade places
        let frame = Constraint::root().child(0, 2).child(1, 1);
        let config = planner.get_new_config(
            &instance,
            &dist,
            &vec![1, 2],
            &[0, 1],
            &frame,
            &mut None,
        );
        assert_eq!(config, None);
    }

    #[test]
    fn test_constraint_install_is_respected() {
        let instance = path_instance();
        let dist = DistTable::new(&instance);
        let mut planner = StepPlanner::new(2, 5, false);

        // force agent 0 away from its goal; agent 1 still planned by PIBT
        let frame = Constraint::root().child(0, 0);
        let config = planner
            .get_new_config(&instance, &dist, &vec![1, 3], &[0, 1], &frame, &mut None)
            .unwrap();
        assert_eq!(config[0], 0);
        assert_eq!(config[1], 2);
    }

    #[test]
    fn test_swap_rule_pulls_blocked_agent_aside() {
        // corridor 0-1-2-3 with a pocket 4 hanging off vertex 2
        let graph = Graph::new(vec![
            vec![1],
            vec![0, 2],
            vec![1, 3, 4],
            vec![2],
            vec![2],
        ]);
        let instance = Instance::new(graph, vec![2, 1], vec![0, 3]);
        let dist = DistTable::new(&instance);
        let mut planner = StepPlanner::new(2, 5, true);

        // agent 0 wants to pass agent 1 inside the corridor; the swap rule
        // sends agent 0 into the pocket and pulls agent 1 after it
        let config = planner
            .get_new_config(
                &instance,
                &dist,
                &vec![2, 1],
                &[0, 1],
                &Constraint::root(),
                &mut None,
            )
            .unwrap();
        assert_eq!(config, vec![4, 2]);
    }

    #[test]
    fn test_scratch_reset_between_invocations() {
        let instance = path_instance();
        let dist = DistTable::new(&instance);
        let mut planner = StepPlanner::new(2, 5, false);

        let first = planner
            .get_new_config(
                &instance,
                &dist,
                &vec![0, 4],
                &[0, 1],
                &Constraint::root(),
                &mut None,
            )
            .unwrap();
        assert_eq!(first, vec![1, 3]);

        // planning again from an unrelated configuration must not see stale marks
        let second = planner
            .get_new_config(
                &instance,
                &dist,
                &vec![4, 0],
                &[0, 1],
                &Constraint::root(),
                &mut None,
            )
            .unwrap();
        // both agents already sit on their goals and stay
        assert_eq!(second, vec![4, 0]);
    }
}
