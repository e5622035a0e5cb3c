use ndarray::{Array1, Array2, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::error::{Error, Result};

mod creditcard;
mod synthetic;

pub use creditcard::load_creditcard;
pub use synthetic::generate_gaussian;

pub type Features = Array2<f32>;
pub type Labels = Array1<i32>;

/// A dataset split into train, test and validation portions.
///
/// Invariant: in each portion the feature row count equals the label
/// count, and labels are binary (0 = majority, 1 = minority).
#[derive(Debug, Clone)]
pub struct DataSplit {
    pub x_train: Features,
    pub y_train: Labels,
    pub x_test: Features,
    pub y_test: Labels,
    pub x_val: Features,
    pub y_val: Labels,
}

/// Partitions rows into a majority bucket (all kept, label 0) and a
/// minority bucket truncated to `floor(majority_count * imb_rate)` rows
/// (label 1). Rows keep their original relative order; nothing is
/// shuffled, so the result is deterministic given the input order.
///
/// If the requested ratio exceeds what the data naturally provides, all
/// minority rows are kept and the achieved ratio stays below the request.
pub fn imbalance_data(
    x: &Features,
    y: &Labels,
    imb_rate: f64,
    min_classes: &[i32],
    maj_classes: &[i32],
) -> Result<(Features, Labels)> {
    if x.nrows() != y.len() {
        return Err(Error::validation(format!(
            "features and labels must contain the same amount of rows ({} != {})",
            x.nrows(),
            y.len()
        )));
    }
    if !(0.0 < imb_rate && imb_rate < 1.0) {
        return Err(Error::validation(format!(
            "imbalance rate {imb_rate} is not in interval 0 < p < 1"
        )));
    }
    if min_classes.is_empty() || maj_classes.is_empty() {
        return Err(Error::validation(
            "minority and majority class lists must be non-empty",
        ));
    }

    let mut maj_rows = Vec::new();
    let mut min_rows = Vec::new();
    for (row, label) in y.iter().enumerate() {
        if min_classes.contains(label) {
            min_rows.push(row);
        }
        if maj_classes.contains(label) {
            maj_rows.push(row);
        }
    }

    let min_len = ((maj_rows.len() as f64) * imb_rate).floor() as usize;
    min_rows.truncate(min_len.min(min_rows.len()));

    let maj_len = maj_rows.len();
    let mut kept = maj_rows;
    kept.extend_from_slice(&min_rows);

    let x_imb = x.select(Axis(0), &kept);
    let y_imb = Array1::from_iter((0..kept.len()).map(|i| i32::from(i >= maj_len)));

    Ok((x_imb, y_imb))
}

/// Stratified train/test split with a seeded shuffle within each class,
/// so class proportions are preserved and results are reproducible.
///
/// The test portion gets `ceil(rows * test_frac)` rows overall,
/// apportioned per class by largest remainder.
pub fn train_test_split(
    x: &Features,
    y: &Labels,
    test_frac: f64,
    seed: u64,
) -> Result<(Features, Labels, Features, Labels)> {
    if x.nrows() != y.len() {
        return Err(Error::validation(format!(
            "features and labels must contain the same amount of rows ({} != {})",
            x.nrows(),
            y.len()
        )));
    }
    if !(0.0 < test_frac && test_frac < 1.0) {
        return Err(Error::validation(format!(
            "test fraction {test_frac} is not in interval 0 < x < 1"
        )));
    }

    let mut class_labels = Vec::new();
    let mut buckets: Vec<Vec<usize>> = Vec::new();
    for (row, label) in y.iter().enumerate() {
        match class_labels.iter().position(|l| l == label) {
            Some(at) => buckets[at].push(row),
            None => {
                class_labels.push(*label);
                buckets.push(vec![row]);
            }
        }
    }

    let n_test = ((x.nrows() as f64) * test_frac).ceil() as usize;
    let quotas = apportion(&buckets, test_frac, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut test_rows = Vec::new();
    let mut train_rows = Vec::new();
    for (bucket, quota) in buckets.iter().zip(quotas) {
        let mut rows = bucket.clone();
        rows.shuffle(&mut rng);
        test_rows.extend_from_slice(&rows[..quota]);
        train_rows.extend_from_slice(&rows[quota..]);
    }

    // Restore original row order within each portion
    test_rows.sort_unstable();
    train_rows.sort_unstable();

    Ok((
        x.select(Axis(0), &train_rows),
        y.select(Axis(0), &train_rows),
        x.select(Axis(0), &test_rows),
        y.select(Axis(0), &test_rows),
    ))
}

/// Per-class test quotas: floor of the exact share, remainders handed
/// out largest-first until the overall test count is met.
fn apportion(buckets: &[Vec<usize>], frac: f64, n_test: usize) -> Vec<usize> {
    let mut quotas = Vec::with_capacity(buckets.len());
    let mut remainders = Vec::with_capacity(buckets.len());
    let mut assigned = 0;

    for (at, bucket) in buckets.iter().enumerate() {
        let exact = bucket.len() as f64 * frac;
        let base = (exact.floor() as usize).min(bucket.len());
        quotas.push(base);
        remainders.push((at, exact - exact.floor()));
        assigned += base;
    }

    remainders.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut leftover = n_test.saturating_sub(assigned);
    for (at, _) in remainders {
        if leftover == 0 {
            break;
        }
        if quotas[at] < buckets[at].len() {
            quotas[at] += 1;
            leftover -= 1;
        }
    }

    quotas
}

/// Imbalances train and test independently towards `imb_rate`, then
/// carves a stratified validation set out of the train portion.
#[allow(clippy::too_many_arguments)]
pub fn get_train_test_val(
    x_train: &Features,
    y_train: &Labels,
    x_test: &Features,
    y_test: &Labels,
    imb_rate: f64,
    min_classes: &[i32],
    maj_classes: &[i32],
    val_frac: f64,
    seed: u64,
) -> Result<DataSplit> {
    if !(0.0 < val_frac && val_frac < 1.0) {
        return Err(Error::validation(format!(
            "validation fraction {val_frac} is not in interval 0 < x < 1"
        )));
    }

    let (x_train, y_train) = imbalance_data(x_train, y_train, imb_rate, min_classes, maj_classes)?;
    let (x_test, y_test) = imbalance_data(x_test, y_test, imb_rate, min_classes, maj_classes)?;
    let (x_train, y_train, x_val, y_val) = train_test_split(&x_train, &y_train, val_frac, seed)?;

    Ok(DataSplit {
        x_train,
        y_train,
        x_test,
        y_test,
        x_val,
        y_val,
    })
}

impl DataSplit {
    /// Minority count and achieved imbalance ratio per portion.
    pub fn stats(&self) -> [(usize, f64); 3] {
        [&self.y_train, &self.y_test, &self.y_val].map(|y| {
            let minority = y.iter().filter(|l| **l == 1).count();
            let majority = y.len() - minority;
            let ratio = if majority > 0 {
                minority as f64 / majority as f64
            } else {
                0.0
            };
            (minority, ratio)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arange_features(n: usize) -> Features {
        Array2::from_shape_fn((n, 1), |(row, _)| row as f32)
    }

    #[test]
    fn imbalance_truncates_minority_to_ratio() {
        let x = arange_features(100);
        let y = Array1::from_iter((0..100).map(|i| i32::from(i < 50)));

        let (x_imb, y_imb) = imbalance_data(&x, &y, 0.2, &[1], &[0]).unwrap();
        assert_eq!(x_imb.nrows(), 60);
        assert_eq!(y_imb.len(), 60);
        assert_eq!(y_imb.sum(), 10);
    }

    #[test]
    fn imbalance_keeps_majority_order() {
        let x = arange_features(6);
        let y = Array1::from_vec(vec![1, 0, 1, 0, 1, 0]);

        let (x_imb, y_imb) = imbalance_data(&x, &y, 0.5, &[1], &[0]).unwrap();
        // Majority rows 1, 3, 5 first and in order, then the minority prefix
        assert_eq!(x_imb.column(0).to_vec(), vec![1.0, 3.0, 5.0, 0.0]);
        assert_eq!(y_imb.to_vec(), vec![0, 0, 0, 1]);
    }

    #[test]
    fn imbalance_never_exceeds_available_minority() {
        let x = arange_features(10);
        let y = Array1::from_iter((0..10).map(|i| i32::from(i < 2)));

        // floor(8 * 0.9) = 7 requested, only 2 exist
        let (_, y_imb) = imbalance_data(&x, &y, 0.9, &[1], &[0]).unwrap();
        assert_eq!(y_imb.sum(), 2);
        assert_eq!(y_imb.len(), 10);
    }

    #[test]
    fn imbalance_rejects_bad_arguments() {
        let x = arange_features(4);
        let y = Array1::from_vec(vec![1, 0, 0, 0]);

        assert!(matches!(
            imbalance_data(&x, &y, 0.0, &[1], &[0]),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            imbalance_data(&x, &y, 1.0, &[1], &[0]),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            imbalance_data(&x, &y, 0.5, &[], &[0]),
            Err(Error::Validation(_))
        ));

        let y_short = Array1::from_vec(vec![1, 0]);
        assert!(matches!(
            imbalance_data(&x, &y_short, 0.5, &[1], &[0]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn split_is_stratified_and_seeded() {
        let x = arange_features(100);
        let y = Array1::from_iter((0..100).map(|i| i32::from(i % 2 == 0)));

        let (x_a, y_a, x_b, y_b) = train_test_split(&x, &y, 0.25, 7).unwrap();
        assert_eq!(x_a.nrows(), 75);
        assert_eq!(x_b.nrows(), 25);
        // 50/50 classes stay 50/50 in both portions (within rounding)
        assert_eq!(y_a.iter().filter(|l| **l == 1).count(), 37);
        assert_eq!(y_b.iter().filter(|l| **l == 1).count(), 13);

        let (x_a2, ..) = train_test_split(&x, &y, 0.25, 7).unwrap();
        assert_eq!(x_a, x_a2);
    }

    #[test]
    fn split_rejects_bad_fraction() {
        let x = arange_features(4);
        let y = Array1::from_vec(vec![1, 0, 0, 0]);
        assert!(train_test_split(&x, &y, 0.0, 1).is_err());
        assert!(train_test_split(&x, &y, 1.0, 1).is_err());
    }

    #[test]
    fn four_row_scenario_shapes() {
        let x = Array2::from_shape_vec((4, 2), vec![1., 2., 3., 4., 5., 6., 7., 8.]).unwrap();
        let y = Array1::from_vec(vec![1, 0, 0, 0]);

        let split =
            get_train_test_val(&x, &y, &x, &y, 0.25, &[1], &[0], 0.25, 42).unwrap();
        assert_eq!(split.x_train.nrows(), 2);
        assert_eq!(split.x_test.nrows(), 3);
        assert_eq!(split.x_val.nrows(), 1);
        assert_eq!(split.y_train.len(), 2);
        assert_eq!(split.y_test.len(), 3);
        assert_eq!(split.y_val.len(), 1);
    }

    #[test]
    fn get_train_test_val_rejects_bad_val_frac() {
        let x = arange_features(4);
        let y = Array1::from_vec(vec![1, 0, 0, 0]);
        assert!(matches!(
            get_train_test_val(&x, &y, &x, &y, 0.25, &[1], &[0], 0.0, 42),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            get_train_test_val(&x, &y, &x, &y, 0.25, &[1], &[0], 1.0, 42),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn split_stats_report_achieved_ratio() {
        let x = arange_features(100);
        let y = Array1::from_iter((0..100).map(|i| i32::from(i < 50)));

        let split =
            get_train_test_val(&x, &y, &x, &y, 0.2, &[1], &[0], 0.25, 42).unwrap();
        let [train, test, val] = split.stats();
        // Test is exactly the imbalance output; train/val may drift by
        // at most the stratified-split rounding
        assert!((test.1 - 0.2).abs() < 1e-9);
        assert_eq!(test.0, 10);
        assert!(train.1 <= 0.25 && val.1 <= 0.25, "{train:?} {val:?}");
    }
}
