use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{Features, Labels};

/// Two overlapping uniform blobs, majority centered at -1 and minority
/// at +1. Used by the `check` command and the test suite so neither
/// depends on dataset files.
pub fn generate_gaussian(n_maj: usize, n_min: usize, dim: usize, seed: u64) -> (Features, Labels) {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut blob = |center: f32, count: usize| -> Vec<f32> {
        (0..count * dim)
            .map(|_| center + rng.gen_range(-1.5..1.5))
            .collect()
    };

    let mut flat = blob(-1.0, n_maj);
    flat.extend(blob(1.0, n_min));

    let x = Array2::from_shape_vec((n_maj + n_min, dim), flat)
        .expect("blob construction is shape-consistent");
    let y = Array1::from_iter((0..n_maj + n_min).map(|i| i32::from(i >= n_maj)));

    (x, y)
}
