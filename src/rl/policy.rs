use ndarray::{ArrayView1, Axis};
use ordered_float::OrderedFloat;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::net::Network;

use super::{Action, ClassAction};

pub trait Policy {
    fn action(&mut self, observation: ArrayView1<f32>) -> ClassAction;
}

/// Uniform random policy, used for the buffer warmup phase.
#[derive(Debug)]
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn action(&mut self, _observation: ArrayView1<f32>) -> ClassAction {
        ClassAction::random(&mut self.rng)
    }
}

/// Epsilon-greedy over a Q-network: random action with probability
/// epsilon, otherwise the argmax of the network's scores.
pub struct EpsilonGreedy<'a, N: Network> {
    network: &'a N,
    epsilon: f64,
    rng: &'a mut StdRng,
}

impl<'a, N: Network> EpsilonGreedy<'a, N> {
    pub fn new(network: &'a N, epsilon: f64, rng: &'a mut StdRng) -> Self {
        Self {
            network,
            epsilon,
            rng,
        }
    }
}

impl<N: Network> Policy for EpsilonGreedy<'_, N> {
    fn action(&mut self, observation: ArrayView1<f32>) -> ClassAction {
        if self.rng.gen::<f64>() < self.epsilon {
            return ClassAction::random(self.rng);
        }

        let batch = observation.insert_axis(Axis(0)).to_owned();
        let scores = self.network.forward(&batch);
        let greedy = scores
            .row(0)
            .iter()
            .copied()
            .enumerate()
            .max_by_key(|(_, score)| OrderedFloat(*score))
            .map(|(action, _)| action)
            .unwrap_or(0);
        ClassAction::from_index(greedy)
    }
}

/// Linear epsilon decay: `epsilon(step) = max(minimum, 1 - step/decay)`.
///
/// Monotonically non-increasing; pinned at `minimum` once `step` reaches
/// `decay_steps`.
#[derive(Debug, Clone)]
pub struct EpsilonSchedule {
    minimum: f64,
    decay_steps: u32,
    step: u32,
}

impl EpsilonSchedule {
    pub fn new(minimum: f64, decay_steps: u32) -> Result<Self> {
        if !(0.0..1.0).contains(&minimum) {
            return Err(Error::validation(format!(
                "minimum epsilon {minimum} is not in interval 0 <= x < 1"
            )));
        }
        if decay_steps == 0 {
            return Err(Error::validation("decay steps must be > 0"));
        }
        Ok(Self {
            minimum,
            decay_steps,
            step: 0,
        })
    }

    pub fn epsilon(&self) -> f64 {
        (1.0 - f64::from(self.step) / f64::from(self.decay_steps)).max(self.minimum)
    }

    pub fn advance(&mut self) {
        self.step = self.step.saturating_add(1);
    }

    pub fn step(&self) -> u32 {
        self.step
    }
}
