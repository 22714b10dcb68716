use rand::distributions::{Distribution, Uniform};
use rand::{rngs::SmallRng, SeedableRng};

use crate::Matrix;

/// Inputs are small non-negative integers, so every partial sum of a
/// product of two `DIM`-sized matrices is exactly representable in f32.
pub const INPUT_RANGE: std::ops::Range<u8> = 0..10;

pub fn rand_matrix(rows: usize, cols: usize, rng: &mut SmallRng) -> Matrix {
    let dist = Uniform::from(INPUT_RANGE);
    Matrix::from_fn(rows, cols, |_, _| dist.sample(rng) as f32)
}

/// Generates the pair of square input matrices for one run.
pub fn generate_inputs(dim: usize, seed: u64) -> (Matrix, Matrix) {
    let mut rng: SmallRng = SeedableRng::seed_from_u64(seed);
    let a = rand_matrix(dim, dim, &mut rng);
    let b = rand_matrix(dim, dim, &mut rng);
    (a, b)
}
