mod highlevel;
mod lowlevel;
mod pibt;

pub(crate) use highlevel::{get_edge_cost, get_h_value, HighLevelNode};
pub(crate) use lowlevel::Constraint;
pub(crate) use pibt::StepPlanner;
