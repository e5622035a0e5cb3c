use std::fs::{self, OpenOptions};
use std::io::Write;

use chrono::Local;
use hashbrown::HashMap;

use crate::data::{Features, Labels};
use crate::error::Result;
use crate::metrics::{classification_metrics, network_predictions, MetricMap};
use crate::net::DenseNet;

mod bandit;
mod ddqn;

pub use bandit::{BanditConfig, TrainBandit};
pub use ddqn::{DdqnConfig, TrainDdqn};

/// `<root>/YYYYMMDD_HHMMSS`, resolved once at orchestrator construction.
pub fn timestamped_dir(root: &str) -> String {
    format!("{root}/{}", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Scalar summaries keyed by metric name and tagged with the global
/// episode counter. Rows buffer in memory and append to
/// `<log_dir>/scalars.csv` on flush; the full history stays available
/// for charting.
#[derive(Debug)]
pub struct SummaryWriter {
    dir: String,
    pending: Vec<(u32, String, f64)>,
    history: HashMap<String, Vec<(u32, f64)>>,
}

impl SummaryWriter {
    pub fn new(dir: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_string(),
            pending: Vec::new(),
            history: HashMap::new(),
        })
    }

    pub fn scalar(&mut self, episode: u32, name: &str, value: f64) {
        self.pending.push((episode, name.to_string(), value));
        self.history
            .entry(name.to_string())
            .or_default()
            .push((episode, value));
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let path = format!("{}/scalars.csv", self.dir);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for (episode, name, value) in self.pending.drain(..) {
            writeln!(file, "{episode},{name},{value}")?;
        }
        Ok(())
    }

    pub fn history(&self, name: &str) -> Option<&Vec<(u32, f64)>> {
        self.history.get(name)
    }
}

/// Downstream-task capabilities the orchestrators invoke at fixed
/// lifecycle points: periodic validation, final evaluation and model
/// persistence. Supplied by a concrete specialization per task.
pub trait TaskHooks {
    fn collect_metrics(
        &mut self,
        network: &DenseNet,
        x_val: &Features,
        y_val: &Labels,
        episode: u32,
        writer: &mut SummaryWriter,
    ) -> Result<()>;

    fn evaluate(
        &mut self,
        network: &DenseNet,
        x_test: &Features,
        y_test: &Labels,
    ) -> Result<MetricMap>;

    fn save_model(&self, network: &DenseNet, model_dir: &str) -> Result<()>;

    fn load_model(&self, path: &str) -> Result<DenseNet>;
}

/// Hooks for the imbalanced-classification task: validation metrics from
/// network predictions, postcard persistence of the network weights.
#[derive(Debug, Default, Clone)]
pub struct ClassifierHooks;

impl ClassifierHooks {
    fn model_path(model_dir: &str) -> String {
        format!("{model_dir}/network.bin")
    }
}

impl TaskHooks for ClassifierHooks {
    fn collect_metrics(
        &mut self,
        network: &DenseNet,
        x_val: &Features,
        y_val: &Labels,
        episode: u32,
        writer: &mut SummaryWriter,
    ) -> Result<()> {
        let y_pred = network_predictions(network, x_val)?;
        let stats = classification_metrics(y_val, &y_pred)?;
        for (metric, value) in stats.iter() {
            writer.scalar(episode, metric.name(), *value);
        }
        Ok(())
    }

    fn evaluate(
        &mut self,
        network: &DenseNet,
        x_test: &Features,
        y_test: &Labels,
    ) -> Result<MetricMap> {
        let y_pred = network_predictions(network, x_test)?;
        classification_metrics(y_test, &y_pred)
    }

    fn save_model(&self, network: &DenseNet, model_dir: &str) -> Result<()> {
        network.save(&Self::model_path(model_dir))
    }

    fn load_model(&self, path: &str) -> Result<DenseNet> {
        DenseNet::load(&Self::model_path(path))
    }
}

/// Rejects any layer spec that is present but malformed. Only dense and
/// dropout topologies are built for tabular data; a conv spec is
/// meaningful for image networks and refused here.
pub(crate) fn validate_layer_specs(
    conv_layers: Option<&[usize]>,
    dense_layers: Option<&[usize]>,
    dropout_layers: Option<&[f32]>,
) -> Result<()> {
    use crate::error::Error;

    if let Some(conv) = conv_layers {
        if conv.is_empty() {
            return Err(Error::validation(
                "conv layer spec must be a non-empty tuple or None",
            ));
        }
        return Err(Error::validation(
            "conv layers are not supported for tabular networks",
        ));
    }
    if let Some(dense) = dense_layers {
        if dense.is_empty() || dense.iter().any(|width| *width == 0) {
            return Err(Error::validation(
                "dense layer spec must be a non-empty tuple of widths > 0, or None",
            ));
        }
    }
    if let Some(dropout) = dropout_layers {
        if dropout.is_empty() || dropout.iter().any(|rate| !(0.0..1.0).contains(rate)) {
            return Err(Error::validation(
                "dropout spec must be a non-empty tuple of rates in [0, 1), or None",
            ));
        }
        if dropout.len() != dense_layers.map_or(0, <[usize]>::len) {
            return Err(Error::validation(
                "dropout spec length must match the dense layer count",
            ));
        }
    }

    Ok(())
}
