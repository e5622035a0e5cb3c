pub mod files {
    pub const MODELS_PATH: &str = "./models";
    pub const LOGS_PATH: &str = "./logs";
}

pub mod data {
    /// Fraction of the train set held out for validation
    pub const VAL_FRAC: f64 = 0.25;
    pub const SPLIT_SEED: u64 = 42;
    /// Default minority/majority ratio to imbalance towards
    pub const IMB_RATE: f64 = 0.1;
}

pub mod net {
    pub const DENSE_LAYERS: [usize; 1] = [256];
    pub const INIT_SEED: u64 = 42;
}

pub mod ddqn {
    pub const EPISODES: u32 = 2_000;
    pub const LEARNING_RATE: f32 = 0.001;
    pub const MIN_EPSILON: f64 = 0.1;
    pub const DECAY_EPISODES: u32 = 1_000;
    pub const TARGET_UPDATE_PERIOD: u32 = 50;
    pub const TARGET_UPDATE_TAU: f32 = 1.0;
    pub const BATCH_SIZE: usize = 64;
    pub const BUFFER_SIZE: usize = 10_000;
    pub const COLLECT_STEPS_PER_EPISODE: usize = 8;
    pub const WARMUP_STEPS: usize = 1_000;
    pub const DISCOUNT: f32 = 1.0;
    pub const VAL_EVERY: u32 = 100;
    pub const LOG_EVERY: u32 = 50;
}

pub mod bandit {
    pub const TRAINING_LOOPS: u32 = 1_000;
    pub const LEARNING_RATE: f32 = 0.001;
    pub const MIN_EPSILON: f64 = 0.0;
    pub const DECAY_STEPS: u32 = 250;
    pub const BATCH_SIZE: usize = 64;
    pub const STEPS_PER_LOOP: usize = 64;
    pub const VAL_EVERY: u32 = 50;
    pub const LOG_EVERY: u32 = 50;
}
