use enum_map::{enum_map, Enum, EnumMap};
use ndarray::Array1;
use ordered_float::OrderedFloat;

use crate::data::{Features, Labels};
use crate::error::{Error, Result};
use crate::net::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum Metric {
    Gmean,
    Fdot5,
    F1,
    F2,
    Tp,
    Tn,
    Fp,
    Fn,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::Gmean => "Gmean",
            Metric::Fdot5 => "Fdot5",
            Metric::F1 => "F1",
            Metric::F2 => "F2",
            Metric::Tp => "TP",
            Metric::Tn => "TN",
            Metric::Fp => "FP",
            Metric::Fn => "FN",
        }
    }

    /// Confusion-matrix counts render as integers, the rest to six places.
    fn is_count(self) -> bool {
        matches!(self, Metric::Tp | Metric::Tn | Metric::Fp | Metric::Fn)
    }
}

pub type MetricMap = EnumMap<Metric, f64>;

/// Computes G-mean, F-beta scores and the confusion matrix from true
/// vs. predicted binary labels. Degenerate denominators score 0 rather
/// than dividing by zero.
pub fn classification_metrics(y_true: &Labels, y_pred: &Labels) -> Result<MetricMap> {
    if y_true.len() != y_pred.len() {
        return Err(Error::validation(format!(
            "true and predicted labels must be of same length ({} != {})",
            y_true.len(),
            y_pred.len()
        )));
    }

    let (mut tp, mut tn, mut fp, mut fneg) = (0u64, 0u64, 0u64, 0u64);
    for (truth, pred) in y_true.iter().zip(y_pred.iter()) {
        match (*truth, *pred) {
            (1, 1) => tp += 1,
            (0, 0) => tn += 1,
            (0, 1) => fp += 1,
            (1, 0) => fneg += 1,
            (truth, pred) => {
                return Err(Error::validation(format!(
                    "labels must be binary, found ({truth}, {pred})"
                )))
            }
        }
    }

    let recall = ratio(tp, tp + fneg);
    let specificity = ratio(tn, tn + fp);

    Ok(enum_map! {
        Metric::Gmean => (recall * specificity).sqrt(),
        Metric::Fdot5 => f_beta(tp, fp, fneg, 0.5),
        Metric::F1 => f_beta(tp, fp, fneg, 1.0),
        Metric::F2 => f_beta(tp, fp, fneg, 2.0),
        Metric::Tp => tp as f64,
        Metric::Tn => tn as f64,
        Metric::Fp => fp as f64,
        Metric::Fn => fneg as f64,
    })
}

fn ratio(num: u64, denom: u64) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

fn f_beta(tp: u64, fp: u64, fneg: u64, beta: f64) -> f64 {
    let b2 = beta * beta;
    let denom = (1.0 + b2) * tp as f64 + b2 * fneg as f64 + fp as f64;
    if denom == 0.0 {
        0.0
    } else {
        (1.0 + b2) * tp as f64 / denom
    }
}

/// Predicted class per row: the argmax over the network's action scores.
pub fn network_predictions(network: &dyn Network, x: &Features) -> Result<Labels> {
    let scores = forward_checked(network, x)?;
    Ok(scores
        .outer_iter()
        .map(|row| {
            row.iter()
                .copied()
                .enumerate()
                .max_by_key(|(_, score)| OrderedFloat(*score))
                .map(|(action, _)| action as i32)
                .unwrap_or(0)
        })
        .collect())
}

/// Score of the highest-valued action per row, for ranking predictions.
pub fn decision_function(network: &dyn Network, x: &Features) -> Result<Array1<f32>> {
    let scores = forward_checked(network, x)?;
    Ok(scores
        .outer_iter()
        .map(|row| row.iter().copied().fold(f32::NEG_INFINITY, f32::max))
        .collect())
}

fn forward_checked(network: &dyn Network, x: &Features) -> Result<ndarray::Array2<f32>> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(Error::validation(
            "network input must be a non-empty 2-dimensional array",
        ));
    }
    Ok(network.forward(x))
}

/// Renders a metrics map the way the evaluation examples print it:
/// `("Gmean", 0.991757) ("TP", 88) ...`
pub fn rounded(map: &MetricMap) -> String {
    map.iter()
        .map(|(metric, value)| {
            if metric.is_count() {
                format!("(\"{}\", {})", metric.name(), *value as u64)
            } else {
                format!("(\"{}\", {:.6})", metric.name(), value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
