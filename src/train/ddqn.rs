use colored::Colorize;
use ndarray::Array2;
use ordered_float::OrderedFloat;
use rand::{rngs::StdRng, SeedableRng};

use crate::constants;
use crate::data::{Features, Labels};
use crate::env::ClassifyEnv;
use crate::error::{Error, Result};
use crate::metrics::MetricMap;
use crate::net::{DenseNet, Network};
use crate::rl::{
    collect_data, Action, ClassAction, EpsilonGreedy, EpsilonSchedule, RandomPolicy, ReplayBuffer,
    Trajectory,
};

use super::{timestamped_dir, validate_layer_specs, SummaryWriter, TaskHooks};

#[derive(Debug, Clone)]
pub struct DdqnConfig {
    pub episodes: u32,
    pub learning_rate: f32,
    pub min_epsilon: f64,
    pub decay_episodes: u32,
    pub model_dir: Option<String>,
    pub log_dir: Option<String>,
    pub target_update_period: u32,
    pub target_update_tau: f32,
    pub batch_size: usize,
    pub buffer_size: usize,
    pub collect_steps_per_episode: usize,
    pub warmup_steps: usize,
    pub discount: f32,
    pub val_every: u32,
    pub log_every: u32,
    pub seed: u64,
}

impl Default for DdqnConfig {
    fn default() -> Self {
        use constants::ddqn::*;
        Self {
            episodes: EPISODES,
            learning_rate: LEARNING_RATE,
            min_epsilon: MIN_EPSILON,
            decay_episodes: DECAY_EPISODES,
            model_dir: None,
            log_dir: None,
            target_update_period: TARGET_UPDATE_PERIOD,
            target_update_tau: TARGET_UPDATE_TAU,
            batch_size: BATCH_SIZE,
            buffer_size: BUFFER_SIZE,
            collect_steps_per_episode: COLLECT_STEPS_PER_EPISODE,
            warmup_steps: WARMUP_STEPS,
            discount: DISCOUNT,
            val_every: VAL_EVERY,
            log_every: LOG_EVERY,
            seed: constants::net::INIT_SEED,
        }
    }
}

struct Compiled {
    env: ClassifyEnv,
    online: DenseNet,
    target: DenseNet,
    buffer: ReplayBuffer,
    writer: SummaryWriter,
    rng: StdRng,
}

/// Double-DQN training orchestrator.
///
/// Lifecycle: constructed uncompiled, compiled once with an environment
/// and network topology, then trained. Validation metrics, evaluation
/// and persistence are delegated to the supplied [`TaskHooks`].
pub struct TrainDdqn<H: TaskHooks> {
    config: DdqnConfig,
    hooks: H,
    model_dir: String,
    log_dir: String,
    global_episode: u32,
    schedule: EpsilonSchedule,
    compiled: Option<Compiled>,
}

impl<H: TaskHooks> TrainDdqn<H> {
    pub fn new(config: DdqnConfig, hooks: H) -> Result<Self> {
        if config.episodes == 0 {
            return Err(Error::validation("episode count must be > 0"));
        }
        if config.learning_rate <= 0.0 {
            return Err(Error::validation("learning rate must be > 0"));
        }
        if config.batch_size == 0 || config.buffer_size < config.batch_size {
            return Err(Error::validation(
                "batch size must be > 0 and no larger than the buffer",
            ));
        }
        if config.target_update_period == 0 {
            return Err(Error::validation("target update period must be > 0"));
        }
        if !(0.0..=1.0).contains(&config.target_update_tau) {
            return Err(Error::validation("target update tau must be in [0, 1]"));
        }
        if config.val_every == 0 || config.log_every == 0 {
            return Err(Error::validation("validation and log cadence must be > 0"));
        }
        let schedule = EpsilonSchedule::new(config.min_epsilon, config.decay_episodes)?;

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
            global_episode: 0,
            schedule,
            compiled: None,
        })
    }

    /// Builds the online and target Q-networks from the layer specs,
    /// then warmup-fills the replay buffer with a random policy.
    pub fn compile_model(
        &mut self,
        env: ClassifyEnv,
        conv_layers: Option<&[usize]>,
        dense_layers: Option<&[usize]>,
        dropout_layers: Option<&[f32]>,
    ) -> Result<()> {
        validate_layer_specs(conv_layers, dense_layers, dropout_layers)?;

        let mut env = env;
        let hidden = dense_layers.unwrap_or(&[]);
        let online = DenseNet::build(
            env.num_features(),
            hidden,
            dropout_layers,
            ClassAction::size(),
            self.config.learning_rate,
            self.config.seed,
        )?;
        let target = online.clone();

        let mut buffer = ReplayBuffer::new(self.config.buffer_size)?;
        let mut warmup_policy = RandomPolicy::new(self.config.seed);
        collect_data(
            &mut env,
            &mut warmup_policy,
            &mut buffer,
            self.config.warmup_steps.max(self.config.batch_size),
            self.config.discount,
            false,
        );

        let writer = SummaryWriter::new(&self.log_dir)?;

        self.compiled = Some(Compiled {
            env,
            online,
            target,
            buffer,
            writer,
            rng: StdRng::seed_from_u64(self.config.seed),
        });
        Ok(())
    }

    /// Runs the episode loop: collect transitions with the current
    /// epsilon-greedy policy, sample a batch, one double-DQN update,
    /// advance the exploration schedule. Periodically syncs the target
    /// network, collects validation metrics and flushes summaries.
    pub fn train(&mut self, x_val: &Features, y_val: &Labels) -> Result<()> {
        let compiled = self
            .compiled
            .as_mut()
            .ok_or_else(|| Error::state("model must be compiled before training"))?;

        for _ in 0..self.config.episodes {
            let epsilon = self.schedule.epsilon();
            {
                let mut policy = EpsilonGreedy::new(&compiled.online, epsilon, &mut compiled.rng);
                collect_data(
                    &mut compiled.env,
                    &mut policy,
                    &mut compiled.buffer,
                    self.config.collect_steps_per_episode,
                    self.config.discount,
                    false,
                );
            }

            let batch = compiled.buffer.sample(self.config.batch_size, &mut compiled.rng)?;
            let loss = double_dqn_update(
                &mut compiled.online,
                &compiled.target,
                &batch,
                &mut compiled.rng,
            );

            self.schedule.advance();
            self.global_episode += 1;

            if self.global_episode % self.config.target_update_period == 0 {
                compiled
                    .target
                    .soft_update(&compiled.online, self.config.target_update_tau);
            }

            if self.global_episode % self.config.val_every == 0 {
                self.hooks.collect_metrics(
                    &compiled.target,
                    x_val,
                    y_val,
                    self.global_episode,
                    &mut compiled.writer,
                )?;
            }

            if self.global_episode % self.config.log_every == 0 {
                compiled.writer.scalar(self.global_episode, "loss", f64::from(loss));
                compiled.writer.scalar(self.global_episode, "epsilon", epsilon);
                compiled.writer.flush()?;
                println!(
                    "{}",
                    format!(
                        "episode {}/{} | epsilon {epsilon:.3} | loss {loss:.5}",
                        self.global_episode, self.config.episodes
                    )
                    .cyan()
                );
            }
        }

        compiled.writer.flush()?;
        Ok(())
    }

    /// Final read-only evaluation of the trained target network.
    pub fn evaluate(&mut self, x_test: &Features, y_test: &Labels) -> Result<MetricMap> {
        let compiled = self
            .compiled
            .as_ref()
            .ok_or_else(|| Error::state("model must be compiled before evaluation"))?;
        let target = &compiled.target;
        self.hooks.evaluate(target, x_test, y_test)
    }

    pub fn save_model(&self) -> Result<()> {
        let compiled = self
            .compiled
            .as_ref()
            .ok_or_else(|| Error::state("model must be compiled before saving"))?;
        self.hooks.save_model(&compiled.target, &self.model_dir)
    }

    pub fn load_model(&self, path: &str) -> Result<DenseNet> {
        self.hooks.load_model(path)
    }

    pub fn compiled(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn global_episode(&self) -> u32 {
        self.global_episode
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

/// One double-DQN update: actions picked by the online network, values
/// read from the target network.
fn double_dqn_update(
    online: &mut DenseNet,
    target: &DenseNet,
    batch: &[&Trajectory],
    rng: &mut StdRng,
) -> f32 {
    let rows = batch.len();
    let dim = online.num_inputs();

    let mut observations = Array2::zeros((rows, dim));
    let mut next_observations = Array2::zeros((rows, dim));
    for (at, trajectory) in batch.iter().enumerate() {
        observations.row_mut(at).assign(&trajectory.observation);
        next_observations.row_mut(at).assign(&trajectory.next_observation);
    }

    let next_online = online.forward(&next_observations);
    let next_target = target.forward(&next_observations);

    let mut targets = online.forward(&observations);
    for (at, trajectory) in batch.iter().enumerate() {
        let best_next = next_online
            .row(at)
            .iter()
            .copied()
            .enumerate()
            .max_by_key(|(_, score)| OrderedFloat(*score))
            .map(|(action, _)| action)
            .unwrap_or(0);

        let future = if trajectory.terminal {
            0.0
        } else {
            trajectory.discount * next_target[[at, best_next]]
        };
        targets[[at, trajectory.action.index()]] = trajectory.reward + future;
    }

    online.fit_batch(&observations, &targets, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generate_gaussian;
    use crate::train::ClassifierHooks;
    use chrono::Local;

    fn tmp_dirs(tag: &str) -> (String, String) {
        let base = std::env::temp_dir().join(format!("imbrl_ddqn_{tag}_{}", std::process::id()));
        (
            base.join("models").to_string_lossy().into_owned(),
            base.join("logs").to_string_lossy().into_owned(),
        )
    }

    fn small_config(tag: &str) -> DdqnConfig {
        let (model_dir, log_dir) = tmp_dirs(tag);
        DdqnConfig {
            episodes: 10,
            learning_rate: 0.01,
            min_epsilon: 0.1,
            decay_episodes: 5,
            model_dir: Some(model_dir),
            log_dir: Some(log_dir),
            target_update_period: 2,
            target_update_tau: 1.0,
            batch_size: 8,
            buffer_size: 64,
            collect_steps_per_episode: 4,
            warmup_steps: 16,
            discount: 1.0,
            val_every: 5,
            log_every: 5,
            seed: 3,
        }
    }

    fn small_env() -> ClassifyEnv {
        let (x, y) = generate_gaussian(40, 8, 4, 11);
        ClassifyEnv::with_options(x, y, 0.2, true, 11).unwrap()
    }

    #[test]
    fn starts_uncompiled_with_derived_dirs() {
        let trainer = TrainDdqn::new(DdqnConfig::default(), ClassifierHooks).unwrap();
        let today = Local::now().format("%Y%m%d").to_string();

        assert!(!trainer.compiled());
        assert_eq!(trainer.global_episode(), 0);
        assert_eq!(trainer.epsilon(), 1.0);
        assert!(trainer.model_dir().starts_with("./models/"));
        assert!(trainer.model_dir().contains(&today));
        assert!(trainer.log_dir().starts_with("./logs/"));
    }

    #[test]
    fn explicit_dirs_are_kept() {
        let config = small_config("dirs");
        let model_dir = config.model_dir.clone().unwrap();
        let trainer = TrainDdqn::new(config, ClassifierHooks).unwrap();
        assert_eq!(trainer.model_dir(), model_dir);
    }

    #[test]
    fn train_before_compile_is_a_state_error() {
        let mut trainer = TrainDdqn::new(small_config("state"), ClassifierHooks).unwrap();
        let (x, y) = generate_gaussian(10, 2, 4, 0);
        assert!(matches!(trainer.train(&x, &y), Err(Error::State(_))));
        assert!(matches!(trainer.evaluate(&x, &y), Err(Error::State(_))));
        assert!(matches!(trainer.save_model(), Err(Error::State(_))));
    }

    #[test]
    fn compile_rejects_malformed_layer_specs() {
        let mut trainer = TrainDdqn::new(small_config("specs"), ClassifierHooks).unwrap();

        assert!(matches!(
            trainer.compile_model(small_env(), Some(&[32]), Some(&[16]), None),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            trainer.compile_model(small_env(), None, Some(&[]), None),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            trainer.compile_model(small_env(), None, Some(&[16]), Some(&[2.0])),
            Err(Error::Validation(_))
        ));
        assert!(!trainer.compiled());
    }

    #[test]
    fn training_runs_all_episodes_and_decays_epsilon() {
        let mut trainer = TrainDdqn::new(small_config("run"), ClassifierHooks).unwrap();
        trainer
            .compile_model(small_env(), None, Some(&[16]), None)
            .unwrap();
        assert!(trainer.compiled());

        let (x_val, y_val) = generate_gaussian(20, 4, 4, 5);
        trainer.train(&x_val, &y_val).unwrap();

        assert_eq!(trainer.global_episode(), 10);
        // decay_episodes = 5 < 10 episodes, so epsilon bottomed out
        assert_eq!(trainer.epsilon(), 0.1);
        assert!(trainer.metric_history("Gmean").is_some());
        assert!(trainer.metric_history("loss").is_some());

        let stats = trainer.evaluate(&x_val, &y_val).unwrap();
        let total = stats[crate::metrics::Metric::Tp]
            + stats[crate::metrics::Metric::Tn]
            + stats[crate::metrics::Metric::Fp]
            + stats[crate::metrics::Metric::Fn];
        assert_eq!(total as usize, x_val.nrows());

        let (model_root, _) = tmp_dirs("run");
        trainer.save_model().unwrap();
        let loaded = trainer.load_model(&model_root).unwrap();
        assert_eq!(loaded.num_actions(), 2);
        std::fs::remove_dir_all(std::path::Path::new(&model_root).parent().unwrap()).ok();
    }
}
