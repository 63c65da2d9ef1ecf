//! Seeded train/test partitioning.

use rand::prelude::*;
use rand::seq::SliceRandom;

use crate::error::{Result, RiskError};

/// Row indices of the two partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    /// Rows used for fitting
    pub train: Vec<usize>,
    /// Rows held out for evaluation
    pub test: Vec<usize>,
}

/// Shuffle `0..n_rows` with a seeded RNG and hold out `ceil(n * test_size)` rows
///
/// # Arguments
/// * `n_rows` - Number of rows to partition
/// * `test_size` - Fraction of rows in the test partition, in (0, 1)
/// * `seed` - Seed for the shuffle
///
/// # Errors
/// Returns [`RiskError::InvalidInput`] for fewer than two rows, a test size
/// outside (0, 1), or a split that leaves either partition empty
pub fn train_test_split(n_rows: usize, test_size: f64, seed: u64) -> Result<TrainTestSplit> {
    if n_rows < 2 {
        return Err(RiskError::InvalidInput(format!(
            "Need at least 2 rows to split, got {n_rows}"
        )));
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(RiskError::InvalidInput(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }

    let n_test = (n_rows as f64 * test_size).ceil() as usize;
    if n_test >= n_rows {
        return Err(RiskError::InvalidInput(format!(
            "test_size {test_size} leaves no training rows out of {n_rows}"
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);

    Ok(TrainTestSplit {
        train,
        test: indices,
    })
}
