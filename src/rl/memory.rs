use std::collections::VecDeque;

use ndarray::Array1;
use rand::Rng;

use crate::error::{Error, Result};

use super::ClassAction;

/// One environment transition. Ownership moves into the replay buffer on
/// insert; the environment keeps no copy.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub observation: Array1<f32>,
    pub action: ClassAction,
    pub reward: f32,
    pub next_observation: Array1<f32>,
    pub discount: f32,
    pub terminal: bool,
}

/// Bounded FIFO ring of trajectories.
///
/// Once full, the oldest entry is evicted on insert. Training batches are
/// drawn uniformly at random with replacement.
#[derive(Debug)]
pub struct ReplayBuffer {
    entries: VecDeque<Trajectory>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::validation("replay buffer capacity must be > 0"));
        }
        Ok(Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    pub fn add(&mut self, trajectory: Trajectory) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(trajectory);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sample(&self, batch_size: usize, rng: &mut impl Rng) -> Result<Vec<&Trajectory>> {
        if self.entries.is_empty() {
            return Err(Error::state("cannot sample from an empty replay buffer"));
        }
        Ok((0..batch_size)
            .map(|_| &self.entries[rng.gen_range(0..self.entries.len())])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn trajectory(reward: f32) -> Trajectory {
        Trajectory {
            observation: Array1::zeros(2),
            action: ClassAction::Majority,
            reward,
            next_observation: Array1::zeros(2),
            discount: 1.0,
            terminal: true,
        }
    }

    #[test]
    fn oldest_entry_is_evicted_first() {
        let mut buffer = ReplayBuffer::new(3).unwrap();
        for reward in 0..4 {
            buffer.add(trajectory(reward as f32));
        }

        assert_eq!(buffer.len(), 3);
        let rewards: Vec<f32> = buffer.entries.iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn sampling_draws_with_replacement() {
        let mut buffer = ReplayBuffer::new(4).unwrap();
        buffer.add(trajectory(1.0));
        buffer.add(trajectory(2.0));

        let mut rng = StdRng::seed_from_u64(0);
        let batch = buffer.sample(16, &mut rng).unwrap();
        assert_eq!(batch.len(), 16);
        assert!(batch.iter().all(|t| t.reward == 1.0 || t.reward == 2.0));
    }

    #[test]
    fn sampling_empty_buffer_fails() {
        let buffer = ReplayBuffer::new(4).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(buffer.sample(1, &mut rng).is_err());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(ReplayBuffer::new(0).is_err());
    }
}
