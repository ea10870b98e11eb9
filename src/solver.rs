mod comm;
mod lacam;
mod lacam2;

pub use lacam::LaCam;
pub use lacam2::LaCam2;

use crate::common::Solution;

pub trait Solver {
    fn solve(&mut self) -> Option<Solution>;
}
