mod action;
mod collect;
mod memory;
mod policy;

pub use action::{Action, ClassAction};
pub use collect::{collect_data, collect_step};
pub use memory::{ReplayBuffer, Trajectory};
pub use policy::{EpsilonGreedy, EpsilonSchedule, Policy, RandomPolicy};
