use ndarray::{Array1, Axis};

use crate::data::{Features, Labels};
use crate::error::{Error, Result};
use crate::rl::ClassAction;

use super::RewardTable;

/// Streaming contextual-bandit view of a labeled dataset.
///
/// Each call to [`BanditEnv::next_batch`] yields the next `batch_size`
/// rows; the dataset is consumed cyclically (wrapping back to the first
/// row), so any number of training loops can be drawn from it.
#[derive(Debug)]
pub struct BanditEnv {
    x: Features,
    y: Labels,
    rewards: RewardTable,
    batch_size: usize,
    cursor: usize,
}

impl BanditEnv {
    pub fn new(x: Features, y: Labels, imb_rate: f64, batch_size: usize) -> Result<Self> {
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
        if batch_size == 0 {
            return Err(Error::validation("batch size must be > 0"));
        }
        if y.iter().any(|label| *label != 0 && *label != 1) {
            return Err(Error::validation("labels must be binary (0 or 1)"));
        }
        let rewards = RewardTable::new(imb_rate)?;

        Ok(Self {
            x,
            y,
            rewards,
            batch_size,
            cursor: 0,
        })
    }

    pub fn num_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The next batch of observations and their true labels.
    pub fn next_batch(&mut self) -> (Features, Labels) {
        let rows: Vec<usize> = (0..self.batch_size)
            .map(|offset| (self.cursor + offset) % self.x.nrows())
            .collect();
        self.cursor = (self.cursor + self.batch_size) % self.x.nrows();

        (self.x.select(Axis(0), &rows), self.y.select(Axis(0), &rows))
    }

    /// Observed reward for each contextual decision in a batch.
    pub fn rewards(&self, labels: &Labels, actions: &[ClassAction]) -> Array1<f32> {
        labels
            .iter()
            .zip(actions)
            .map(|(label, action)| self.rewards.reward(*label, *action))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn env() -> BanditEnv {
        let x = Array2::from_shape_fn((5, 2), |(row, _)| row as f32);
        let y = Array1::from_vec(vec![0, 0, 0, 0, 1]);
        BanditEnv::new(x, y, 0.2, 3).unwrap()
    }

    #[test]
    fn batches_wrap_cyclically() {
        let mut env = env();
        let (x1, _) = env.next_batch();
        assert_eq!(x1.column(0).to_vec(), vec![0.0, 1.0, 2.0]);

        let (x2, y2) = env.next_batch();
        assert_eq!(x2.column(0).to_vec(), vec![3.0, 4.0, 0.0]);
        assert_eq!(y2.to_vec(), vec![0, 1, 0]);
    }

    #[test]
    fn rewards_match_table() {
        let env = env();
        let labels = Array1::from_vec(vec![1, 0]);
        let rewards = env.rewards(&labels, &[ClassAction::Minority, ClassAction::Minority]);
        assert_eq!(rewards.to_vec(), vec![1.0, -0.2]);
    }

    #[test]
    fn construction_validates_inputs() {
        let x = Array2::<f32>::zeros((3, 2));
        let y = Array1::from_vec(vec![0, 1, 0]);
        assert!(BanditEnv::new(x.clone(), y.clone(), 0.2, 0).is_err());
        assert!(BanditEnv::new(x.clone(), y.clone(), 1.5, 2).is_err());
        assert!(BanditEnv::new(x, y, 0.2, 2).is_ok());
    }
}
