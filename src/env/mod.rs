use ndarray::Array1;

use crate::error::{Error, Result};
use crate::rl::{Action, ClassAction};

mod bandit;
mod classify;

pub use bandit::BanditEnv;
pub use classify::ClassifyEnv;

/// One environment step: the next observation, the reward earned for the
/// decision just taken, and whether the episode ended.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub observation: Array1<f32>,
    pub reward: f32,
    pub terminal: bool,
}

/// A decision process an agent can interact with. Adapted to
/// classification: observations are feature rows, actions are predicted
/// classes.
pub trait Environment {
    /// Starts a fresh episode and returns the initial observation.
    fn reset(&mut self) -> Array1<f32>;

    /// The observation the next decision will be judged against.
    fn observation(&self) -> Array1<f32>;

    fn step(&mut self, action: ClassAction) -> Snapshot;
}

/// Asymmetric reward shaping for imbalanced classification.
///
/// Minority decisions earn the full +/-1 while majority decisions are
/// scaled down by the imbalance rate, so both classes contribute equal
/// total reward mass despite minority scarcity.
#[derive(Debug, Clone, Copy)]
pub struct RewardTable {
    minority: f32,
    majority: f32,
}

impl RewardTable {
    pub fn new(imb_rate: f64) -> Result<Self> {
        if !(0.0 < imb_rate && imb_rate < 1.0) {
            return Err(Error::validation(format!(
                "imbalance rate {imb_rate} is not in interval 0 < p < 1"
            )));
        }
        Ok(Self {
            minority: 1.0,
            majority: imb_rate as f32,
        })
    }

    pub fn reward(&self, label: i32, action: ClassAction) -> f32 {
        let correct = action.index() as i32 == label;
        let magnitude = if label == 1 { self.minority } else { self.majority };
        if correct {
            magnitude
        } else {
            -magnitude
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewards_scale_with_imbalance_rate() {
        let table = RewardTable::new(0.2).unwrap();

        assert_eq!(table.reward(1, ClassAction::Minority), 1.0);
        assert_eq!(table.reward(1, ClassAction::Majority), -1.0);
        assert_eq!(table.reward(0, ClassAction::Majority), 0.2);
        assert_eq!(table.reward(0, ClassAction::Minority), -0.2);
    }

    #[test]
    fn rate_must_sit_in_open_interval() {
        assert!(RewardTable::new(0.0).is_err());
        assert!(RewardTable::new(1.0).is_err());
        assert!(RewardTable::new(-0.5).is_err());
        assert!(RewardTable::new(0.5).is_ok());
    }
}
