use ndarray::Array1;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::{Features, Labels};
use crate::error::{Error, Result};
use crate::rl::ClassAction;

use super::{Environment, RewardTable, Snapshot};

/// Presents a labeled dataset one row at a time as single-step episodes.
///
/// Each `step` judges the action as a class prediction for the current
/// row, rewards it through the [`RewardTable`], then moves to the next
/// row. Every episode is terminal after one decision. Dataset exhaustion
/// wraps around cyclically, reshuffling the visit order on each pass when
/// shuffling is enabled, so a collector can step indefinitely without
/// calling `reset`.
#[derive(Debug)]
pub struct ClassifyEnv {
    x: Features,
    y: Labels,
    rewards: RewardTable,
    order: Vec<usize>,
    cursor: usize,
    steps: u64,
    shuffle: bool,
    rng: StdRng,
}

impl ClassifyEnv {
    pub fn new(x: Features, y: Labels, imb_rate: f64) -> Result<Self> {
        Self::with_options(x, y, imb_rate, true, 0)
    }

    pub fn with_options(
        x: Features,
        y: Labels,
        imb_rate: f64,
        shuffle: bool,
        seed: u64,
    ) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(Error::validation(format!(
                "features and labels must contain the same amount of rows ({} != {})",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(Error::validation("dataset must contain at least one row"));
        }
        if y.iter().any(|label| *label != 0 && *label != 1) {
            return Err(Error::validation("labels must be binary (0 or 1)"));
        }
        let rewards = RewardTable::new(imb_rate)?;

        let mut env = Self {
            order: (0..x.nrows()).collect(),
            cursor: 0,
            steps: 0,
            shuffle,
            rng: StdRng::seed_from_u64(seed),
            x,
            y,
            rewards,
        };
        env.deal();
        Ok(env)
    }

    pub fn num_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps
    }

    fn deal(&mut self) {
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
        self.cursor = 0;
    }

    fn current_row(&self) -> usize {
        self.order[self.cursor]
    }

    fn advance(&mut self) {
        self.cursor += 1;
        if self.cursor >= self.order.len() {
            self.deal();
        }
    }
}

impl Environment for ClassifyEnv {
    fn reset(&mut self) -> Array1<f32> {
        self.deal();
        self.observation()
    }

    fn observation(&self) -> Array1<f32> {
        self.x.row(self.current_row()).to_owned()
    }

    fn step(&mut self, action: ClassAction) -> Snapshot {
        let label = self.y[self.current_row()];
        let reward = self.rewards.reward(label, action);

        self.advance();
        self.steps += 1;

        Snapshot {
            observation: self.observation(),
            reward,
            terminal: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn tiny_env(shuffle: bool) -> ClassifyEnv {
        let x = Array2::from_shape_fn((4, 2), |(row, _)| row as f32);
        let y = Array1::from_vec(vec![0, 0, 0, 1]);
        ClassifyEnv::with_options(x, y, 0.25, shuffle, 3).unwrap()
    }

    #[test]
    fn episodes_are_single_step() {
        let mut env = tiny_env(false);
        env.reset();
        let snapshot = env.step(ClassAction::Majority);
        assert!(snapshot.terminal);
        assert_eq!(snapshot.reward, 0.25);
    }

    #[test]
    fn sequential_variant_walks_rows_in_order_and_wraps() {
        let mut env = tiny_env(false);
        let first = env.reset();
        assert_eq!(first[0], 0.0);

        for expected in [1.0, 2.0, 3.0, 0.0, 1.0] {
            let snapshot = env.step(ClassAction::Majority);
            assert_eq!(snapshot.observation[0], expected);
        }
        assert_eq!(env.steps_taken(), 5);
    }

    #[test]
    fn rewards_follow_labels() {
        let mut env = tiny_env(false);
        env.reset();
        // Rows 0..=2 are majority, row 3 minority
        assert_eq!(env.step(ClassAction::Minority).reward, -0.25);
        assert_eq!(env.step(ClassAction::Majority).reward, 0.25);
        env.step(ClassAction::Majority);
        assert_eq!(env.step(ClassAction::Minority).reward, 1.0);
    }

    #[test]
    fn shuffled_variant_visits_every_row_per_pass() {
        let mut env = tiny_env(true);
        env.reset();
        let mut seen = vec![env.observation()[0]];
        for _ in 0..3 {
            seen.push(env.step(ClassAction::Majority).observation[0]);
        }
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn construction_validates_inputs() {
        let x = Array2::<f32>::zeros((3, 2));
        let y_short = Array1::from_vec(vec![0, 1]);
        assert!(ClassifyEnv::new(x.clone(), y_short, 0.2).is_err());

        let y_bad = Array1::from_vec(vec![0, 1, 2]);
        assert!(ClassifyEnv::new(x.clone(), y_bad, 0.2).is_err());

        let y = Array1::from_vec(vec![0, 1, 0]);
        assert!(ClassifyEnv::new(x.clone(), y.clone(), 0.0).is_err());
        assert!(ClassifyEnv::new(x, y, 0.2).is_ok());

        let empty = Array2::<f32>::zeros((0, 2));
        assert!(ClassifyEnv::new(empty, Array1::from_vec(vec![]), 0.2).is_err());
    }
}
