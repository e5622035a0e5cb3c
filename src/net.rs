use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::Features;
use crate::error::{Error, Result};

/// The tensor-computation contract the trainers depend on: a forward
/// pass over a batch of feature rows yielding one score per action.
pub trait Network {
    fn forward(&self, x: &Features) -> Array2<f32>;

    fn num_actions(&self) -> usize;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DenseLayer {
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl DenseLayer {
    fn new(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Self {
        // Glorot-style uniform init
        let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
        Self {
            weights: Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit)),
            bias: Array1::zeros(fan_out),
        }
    }
}

/// Plain multilayer perceptron: ReLU hidden layers, linear output, SGD
/// on a squared error against per-action targets. Optional inverted
/// dropout on hidden activations during fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseNet {
    layers: Vec<DenseLayer>,
    dropout: Vec<f32>,
    learning_rate: f32,
}

impl DenseNet {
    pub fn build(
        input_dim: usize,
        hidden: &[usize],
        dropout: Option<&[f32]>,
        num_actions: usize,
        learning_rate: f32,
        seed: u64,
    ) -> Result<Self> {
        if input_dim == 0 || num_actions == 0 {
            return Err(Error::validation(
                "input dimension and action count must be > 0",
            ));
        }
        if hidden.iter().any(|width| *width == 0) {
            return Err(Error::validation("hidden layer widths must be > 0"));
        }
        if learning_rate <= 0.0 {
            return Err(Error::validation("learning rate must be > 0"));
        }
        let dropout = match dropout {
            Some(rates) => {
                if rates.len() != hidden.len() {
                    return Err(Error::validation(format!(
                        "dropout spec length {} must match hidden layer count {}",
                        rates.len(),
                        hidden.len()
                    )));
                }
                if rates.iter().any(|rate| !(0.0..1.0).contains(rate)) {
                    return Err(Error::validation(
                        "dropout rates must be in interval 0 <= x < 1",
                    ));
                }
                rates.to_vec()
            }
            None => vec![0.0; hidden.len()],
        };

        let mut rng = StdRng::seed_from_u64(seed);
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut fan_in = input_dim;
        for width in hidden {
            layers.push(DenseLayer::new(fan_in, *width, &mut rng));
            fan_in = *width;
        }
        layers.push(DenseLayer::new(fan_in, num_actions, &mut rng));

        Ok(Self {
            layers,
            dropout,
            learning_rate,
        })
    }

    pub fn num_inputs(&self) -> usize {
        self.layers[0].weights.nrows()
    }

    /// One SGD step towards `targets`; returns the batch mean squared
    /// error before the update.
    pub fn fit_batch(&mut self, x: &Features, targets: &Array2<f32>, rng: &mut StdRng) -> f32 {
        let rows = x.nrows() as f32;
        let last = self.layers.len() - 1;

        // Forward pass, caching activations and dropout masks
        let mut activations = vec![x.clone()];
        let mut masks: Vec<Option<Array2<f32>>> = Vec::with_capacity(last);
        for (at, layer) in self.layers.iter().enumerate() {
            let z = activations[at].dot(&layer.weights) + &layer.bias;
            if at == last {
                activations.push(z);
            } else {
                let mut a = z.mapv(|v| v.max(0.0));
                let rate = self.dropout[at];
                if rate > 0.0 {
                    let keep = 1.0 - rate;
                    let mask = Array2::from_shape_fn(a.dim(), |_| {
                        if rng.gen::<f32>() < keep {
                            1.0 / keep
                        } else {
                            0.0
                        }
                    });
                    a *= &mask;
                    masks.push(Some(mask));
                } else {
                    masks.push(None);
                }
                activations.push(a);
            }
        }

        let prediction = &activations[last + 1];
        let loss = (prediction - targets).mapv(|v| v * v).mean().unwrap_or(0.0);

        // Backward pass
        let mut delta = (prediction - targets) * (2.0 / rows);
        for at in (0..self.layers.len()).rev() {
            let grad_w = activations[at].t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));

            if at > 0 {
                let mut upstream = delta.dot(&self.layers[at].weights.t());
                // ReLU gate: the cached activation is zero exactly where
                // the pre-activation was clipped (or dropped)
                upstream
                    .zip_mut_with(&activations[at], |u, a| *u = if *a > 0.0 { *u } else { 0.0 });
                if let Some(mask) = &masks[at - 1] {
                    upstream *= mask;
                }
                delta = upstream;
            }

            let layer = &mut self.layers[at];
            layer.weights.scaled_add(-self.learning_rate, &grad_w);
            layer.bias.scaled_add(-self.learning_rate, &grad_b);
        }

        loss
    }

    /// Blends another network's weights into this one:
    /// `w = tau * other + (1 - tau) * w`. A tau of 1 is a hard copy.
    pub fn soft_update(&mut self, other: &DenseNet, tau: f32) {
        for (mine, theirs) in self.layers.iter_mut().zip(&other.layers) {
            mine.weights
                .zip_mut_with(&theirs.weights, |m, t| *m = tau * t + (1.0 - tau) * *m);
            mine.bias
                .zip_mut_with(&theirs.bias, |m, t| *m = tau * t + (1.0 - tau) * *m);
        }
    }

    pub fn save(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, postcard::to_stdvec(self)?)?;
        Ok(())
    }

    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).is_file() {
            return Err(Error::resource(format!("model file {path} does not exist")));
        }
        Ok(postcard::from_bytes(&fs::read(path)?)?)
    }
}

impl Network for DenseNet {
    fn forward(&self, x: &Features) -> Array2<f32> {
        let last = self.layers.len() - 1;
        let mut a = x.clone();
        for (at, layer) in self.layers.iter().enumerate() {
            let z = a.dot(&layer.weights) + &layer.bias;
            a = if at == last { z } else { z.mapv(|v| v.max(0.0)) };
        }
        a
    }

    fn num_actions(&self) -> usize {
        self.layers[self.layers.len() - 1].weights.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net() -> DenseNet {
        DenseNet::build(3, &[8], None, 2, 0.05, 7).unwrap()
    }

    #[test]
    fn forward_produces_one_score_per_action() {
        let net = net();
        let x = Array2::from_shape_fn((5, 3), |(row, col)| (row + col) as f32 * 0.1);
        let scores = net.forward(&x);
        assert_eq!(scores.dim(), (5, 2));
        assert_eq!(net.num_actions(), 2);
        assert_eq!(net.num_inputs(), 3);
    }

    #[test]
    fn build_validates_arguments() {
        assert!(DenseNet::build(0, &[8], None, 2, 0.05, 7).is_err());
        assert!(DenseNet::build(3, &[0], None, 2, 0.05, 7).is_err());
        assert!(DenseNet::build(3, &[8], None, 0, 0.05, 7).is_err());
        assert!(DenseNet::build(3, &[8], None, 2, 0.0, 7).is_err());
        assert!(DenseNet::build(3, &[8], Some(&[0.2, 0.2]), 2, 0.05, 7).is_err());
        assert!(DenseNet::build(3, &[8], Some(&[1.0]), 2, 0.05, 7).is_err());
        assert!(DenseNet::build(3, &[8], Some(&[0.2]), 2, 0.05, 7).is_ok());
        assert!(DenseNet::build(3, &[], None, 2, 0.05, 7).is_ok());
    }

    #[test]
    fn fitting_reduces_the_loss() {
        let mut net = net();
        let mut rng = StdRng::seed_from_u64(0);
        let x = Array2::from_shape_fn((4, 3), |(row, _)| row as f32 * 0.25);
        let targets = Array2::from_shape_fn((4, 2), |(row, col)| {
            if (row % 2 == 0) == (col == 0) {
                1.0
            } else {
                -1.0
            }
        });

        let first = net.fit_batch(&x, &targets, &mut rng);
        for _ in 0..200 {
            net.fit_batch(&x, &targets, &mut rng);
        }
        let last = net.fit_batch(&x, &targets, &mut rng);
        assert!(last < first, "loss did not improve: {first} -> {last}");
    }

    #[test]
    fn hard_soft_update_copies_weights() {
        let mut target = net();
        let online = DenseNet::build(3, &[8], None, 2, 0.05, 99).unwrap();

        target.soft_update(&online, 1.0);
        let x = Array2::from_elem((1, 3), 0.5);
        assert_eq!(target.forward(&x), online.forward(&x));
    }

    #[test]
    fn zero_tau_soft_update_is_a_no_op() {
        let mut target = net();
        let online = DenseNet::build(3, &[8], None, 2, 0.05, 99).unwrap();
        let x = Array2::from_elem((1, 3), 0.5);

        let before = target.forward(&x);
        target.soft_update(&online, 0.0);
        assert_eq!(target.forward(&x), before);
    }

    #[test]
    fn save_load_round_trip() {
        let net = net();
        let path = std::env::temp_dir()
            .join(format!("imbrl_net_{}", std::process::id()))
            .join("qnet.bin");
        let path = path.to_string_lossy().into_owned();

        net.save(&path).unwrap();
        let loaded = DenseNet::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let x = Array2::from_elem((2, 3), 0.3);
        assert_eq!(net.forward(&x), loaded.forward(&x));
    }

    #[test]
    fn loading_missing_file_is_a_resource_error() {
        assert!(matches!(
            DenseNet::load("/nonexistent/qnet.bin"),
            Err(Error::Resource(_))
        ));
    }
}
