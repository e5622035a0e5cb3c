use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, Axis};

use crate::error::{Error, Result};

use super::{Features, Labels};

/// Loads the Kaggle credit-card fraud CSVs from local filepaths.
///
/// The `Class` column becomes the label (1 = fraud/minority, 0 =
/// majority); `Time` is dropped since future data would sit in another
/// epoch. Optional min-max normalization is fitted on the train portion
/// and applied to both.
pub fn load_creditcard(
    fp_train: &str,
    fp_test: &str,
    normalization: bool,
) -> Result<(Features, Labels, Features, Labels)> {
    if !Path::new(fp_train).is_file() {
        return Err(Error::resource(format!("train file {fp_train} does not exist")));
    }
    if !Path::new(fp_test).is_file() {
        return Err(Error::resource(format!("test file {fp_test} does not exist")));
    }

    let (mut x_train, y_train) = parse_csv(fp_train)?;
    let (mut x_test, y_test) = parse_csv(fp_test)?;

    if x_train.ncols() != x_test.ncols() {
        return Err(Error::validation(format!(
            "train and test column counts differ ({} != {})",
            x_train.ncols(),
            x_test.ncols()
        )));
    }

    if normalization {
        let mini = fold_columns(&x_train, f32::INFINITY, f32::min);
        let maxi = fold_columns(&x_train, f32::NEG_INFINITY, f32::max);
        normalize(&mut x_train, &mini, &maxi);
        normalize(&mut x_test, &mini, &maxi);
    }

    Ok((x_train, y_train, x_test, y_test))
}

fn parse_csv(path: &str) -> Result<(Features, Labels)> {
    let raw = fs::read_to_string(path)?;
    let mut lines = raw.lines();

    let header = lines
        .next()
        .ok_or_else(|| Error::validation(format!("{path} is empty")))?;
    let columns: Vec<&str> = header.split(',').map(|c| c.trim().trim_matches('"')).collect();

    let class_col = columns
        .iter()
        .position(|c| *c == "Class")
        .ok_or_else(|| Error::validation(format!("{path} has no `Class` column")))?;
    let time_col = columns.iter().position(|c| *c == "Time");

    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut width = 0;

    for (row, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let mut label = None;
        let mut row_features = Vec::new();
        for (col, field) in line.split(',').enumerate() {
            let value: f64 = field.trim().parse().map_err(|_| {
                Error::validation(format!("{path}:{}: `{field}` is not numeric", row + 2))
            })?;
            if col == class_col {
                label = Some(value as i32);
            } else if Some(col) != time_col {
                row_features.push(value as f32);
            }
        }

        if width == 0 {
            width = row_features.len();
        } else if row_features.len() != width {
            return Err(Error::validation(format!(
                "{path}:{}: expected {width} feature columns, found {}",
                row + 2,
                row_features.len()
            )));
        }

        labels.push(label.ok_or_else(|| {
            Error::validation(format!("{path}:{}: missing `Class` value", row + 2))
        })?);
        features.extend(row_features);
    }

    let rows = labels.len();
    let x = Array2::from_shape_vec((rows, width), features)
        .map_err(|e| Error::validation(e.to_string()))?;
    Ok((x, Array1::from_vec(labels)))
}

fn fold_columns(x: &Features, init: f32, fold: fn(f32, f32) -> f32) -> Array1<f32> {
    x.axis_iter(Axis(1))
        .map(|col| col.iter().copied().fold(init, fold))
        .collect()
}

fn normalize(x: &mut Features, mini: &Array1<f32>, maxi: &Array1<f32>) {
    for mut row in x.axis_iter_mut(Axis(0)) {
        for (at, value) in row.iter_mut().enumerate() {
            let range = maxi[at] - mini[at];
            *value = if range > 0.0 { (*value - mini[at]) / range } else { 0.0 };
        }
    }
}
