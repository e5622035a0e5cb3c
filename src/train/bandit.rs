use colored::Colorize;
use ordered_float::OrderedFloat;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::constants;
use crate::data::{Features, Labels};
use crate::env::BanditEnv;
use crate::error::{Error, Result};
use crate::metrics::MetricMap;
use crate::net::{DenseNet, Network};
use crate::rl::{Action, ClassAction, EpsilonSchedule};

use super::{timestamped_dir, validate_layer_specs, SummaryWriter, TaskHooks};

#[derive(Debug, Clone)]
pub struct BanditConfig {
    pub training_loops: u32,
    pub learning_rate: f32,
    pub min_epsilon: f64,
    pub decay_steps: u32,
    pub model_dir: Option<String>,
    pub log_dir: Option<String>,
    pub batch_size: usize,
    pub steps_per_loop: usize,
    pub val_every: u32,
    pub log_every: u32,
    pub seed: u64,
}

impl Default for BanditConfig {
    fn default() -> Self {
        use constants::bandit::*;
        Self {
            training_loops: TRAINING_LOOPS,
            learning_rate: LEARNING_RATE,
            min_epsilon: MIN_EPSILON,
            decay_steps: DECAY_STEPS,
            model_dir: None,
            log_dir: None,
            batch_size: BATCH_SIZE,
            steps_per_loop: STEPS_PER_LOOP,
            val_every: VAL_EVERY,
            log_every: LOG_EVERY,
            seed: constants::net::INIT_SEED,
        }
    }
}

struct Compiled {
    env: BanditEnv,
    network: DenseNet,
    writer: SummaryWriter,
    rng: StdRng,
}

/// Contextual-bandit training orchestrator (neural epsilon-greedy).
///
/// Shares the constructor shape, epsilon decay and directory naming with
/// [`super::TrainDdqn`], but the training unit is a loop over a batch of
/// `steps_per_loop` contextual decisions streamed from a [`BanditEnv`];
/// there is no target network and no replay eviction.
pub struct TrainBandit<H: TaskHooks> {
    config: BanditConfig,
    hooks: H,
    model_dir: String,
    log_dir: String,
    global_loop: u32,
    schedule: EpsilonSchedule,
    compiled: Option<Compiled>,
}

impl<H: TaskHooks> TrainBandit<H> {
    pub fn new(config: BanditConfig, hooks: H) -> Result<Self> {
        if config.training_loops == 0 {
            return Err(Error::validation("training loop count must be > 0"));
        }
        if config.learning_rate <= 0.0 {
            return Err(Error::validation("learning rate must be > 0"));
        }
        if config.batch_size == 0 || config.steps_per_loop == 0 {
            return Err(Error::validation(
                "batch size and steps per loop must be > 0",
            ));
        }
        if config.val_every == 0 || config.log_every == 0 {
            return Err(Error::validation("validation and log cadence must be > 0"));
        }
        let schedule = EpsilonSchedule::new(config.min_epsilon, config.decay_steps)?;

        let model_dir = config
            .model_dir
            .clone()
            .unwrap_or_else(|| timestamped_dir(constants::files::MODELS_PATH));
        let log_dir = config
            .log_dir
            .clone()
            .unwrap_or_else(|| timestamped_dir(constants::files::LOGS_PATH));

        Ok(Self {
            config,
            hooks,
            model_dir,
            log_dir,
            global_loop: 0,
            schedule,
            compiled: None,
        })
    }

    /// Builds the reward-predictor network from the layer specs.
    pub fn compile_model(
        &mut self,
        env: BanditEnv,
        conv_layers: Option<&[usize]>,
        dense_layers: Option<&[usize]>,
        dropout_layers: Option<&[f32]>,
    ) -> Result<()> {
        validate_layer_specs(conv_layers, dense_layers, dropout_layers)?;

        let network = DenseNet::build(
            env.num_features(),
            dense_layers.unwrap_or(&[]),
            dropout_layers,
            ClassAction::size(),
            self.config.learning_rate,
            self.config.seed,
        )?;
        let writer = SummaryWriter::new(&self.log_dir)?;

        self.compiled = Some(Compiled {
            env,
            network,
            writer,
            rng: StdRng::seed_from_u64(self.config.seed),
        });
        Ok(())
    }

    /// Runs `training_loops` iterations, each consuming
    /// `steps_per_loop * batch_size` contextual decisions and regressing
    /// the reward predictor on the observed rewards.
    pub fn train(&mut self, x_val: &Features, y_val: &Labels) -> Result<()> {
        let compiled = self
            .compiled
            .as_mut()
            .ok_or_else(|| Error::state("model must be compiled before training"))?;

        for _ in 0..self.config.training_loops {
            let epsilon = self.schedule.epsilon();
            let mut loss = 0.0;

            for _ in 0..self.config.steps_per_loop {
                let (x_batch, y_batch) = compiled.env.next_batch();

                let scores = compiled.network.forward(&x_batch);
                let actions: Vec<ClassAction> = scores
                    .outer_iter()
                    .map(|row| {
                        if compiled.rng.gen::<f64>() < epsilon {
                            ClassAction::random(&mut compiled.rng)
                        } else {
                            let greedy = row
                                .iter()
                                .copied()
                                .enumerate()
                                .max_by_key(|(_, score)| OrderedFloat(*score))
                                .map(|(action, _)| action)
                                .unwrap_or(0);
                            ClassAction::from_index(greedy)
                        }
                    })
                    .collect();

                let rewards = compiled.env.rewards(&y_batch, &actions);
                let mut targets = scores;
                for (at, action) in actions.iter().enumerate() {
                    targets[[at, action.index()]] = rewards[at];
                }

                loss = compiled
                    .network
                    .fit_batch(&x_batch, &targets, &mut compiled.rng);
            }

            self.schedule.advance();
            self.global_loop += 1;

            if self.global_loop % self.config.val_every == 0 {
                self.hooks.collect_metrics(
                    &compiled.network,
                    x_val,
                    y_val,
                    self.global_loop,
                    &mut compiled.writer,
                )?;
            }

            if self.global_loop % self.config.log_every == 0 {
                compiled.writer.scalar(self.global_loop, "loss", f64::from(loss));
                compiled.writer.scalar(self.global_loop, "epsilon", epsilon);
                compiled.writer.flush()?;
                println!(
                    "{}",
                    format!(
                        "loop {}/{} | epsilon {epsilon:.3} | loss {loss:.5}",
                        self.global_loop, self.config.training_loops
                    )
                    .cyan()
                );
            }
        }

        compiled.writer.flush()?;
        Ok(())
    }

    pub fn evaluate(&mut self, x_test: &Features, y_test: &Labels) -> Result<MetricMap> {
        let compiled = self
            .compiled
            .as_ref()
            .ok_or_else(|| Error::state("model must be compiled before evaluation"))?;
        let network = &compiled.network;
        self.hooks.evaluate(network, x_test, y_test)
    }

    pub fn save_model(&self) -> Result<()> {
        let compiled = self
            .compiled
            .as_ref()
            .ok_or_else(|| Error::state("model must be compiled before saving"))?;
        self.hooks.save_model(&compiled.network, &self.model_dir)
    }

    pub fn load_model(&self, path: &str) -> Result<DenseNet> {
        self.hooks.load_model(path)
    }

    pub fn compiled(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn global_loop(&self) -> u32 {
        self.global_loop
    }

    pub fn epsilon(&self) -> f64 {
        self.schedule.epsilon()
    }

    pub fn model_dir(&self) -> &str {
        &self.model_dir
    }

    pub fn log_dir(&self) -> &str {
        &self.log_dir
    }

    pub fn metric_history(&self, name: &str) -> Option<&Vec<(u32, f64)>> {
        self.compiled
            .as_ref()
            .and_then(|compiled| compiled.writer.history(name))
    }
}
