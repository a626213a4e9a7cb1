//! Seeded train/test partitioning.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use pt_types::{DataError, DataSplit, Dataset, PtResult};

/// Options for [`train_test_split`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitOptions {
    /// Fraction of rows assigned to the test subset, in (0, 1).
    pub test_fraction: f64,
    /// Seed for the row shuffle.
    pub seed: u64,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 0,
        }
    }
}

impl SplitOptions {
    pub fn new(test_fraction: f64) -> Self {
        Self {
            test_fraction,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of training rows for a dataset of `n` rows.
    pub fn train_len(&self, n: usize) -> usize {
        ((1.0 - self.test_fraction) * n as f64).round() as usize
    }
}

/// Partition `dataset` into disjoint train and test subsets.
///
/// Row indices are shuffled with a seeded `ChaCha8Rng`; the first
/// `round((1 - test_fraction) * N)` go to train and the rest to test. Both
/// subsets must end up non-empty.
pub fn train_test_split(dataset: &Dataset, options: &SplitOptions) -> PtResult<DataSplit> {
    let fraction = options.test_fraction;
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(DataError::InvalidSplit {
            message: format!("test fraction must be in (0, 1), got {}", fraction),
        }
        .into());
    }

    let n = dataset.len();
    let train_len = options.train_len(n);
    if train_len == 0 || train_len >= n {
        return Err(DataError::InsufficientData {
            message: format!(
                "{} rows cannot be split with test fraction {}",
                n, fraction
            ),
        }
        .into());
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    indices.shuffle(&mut rng);

    let (train_idx, test_idx) = indices.split_at(train_len);
    let pick = |idx: &[usize]| -> Dataset {
        idx.iter().map(|&i| dataset.samples[i].clone()).collect::<Vec<_>>().into()
    };

    let split = DataSplit::new(pick(train_idx), pick(test_idx));
    tracing::info!(
        "Split {} rows into {} train / {} test (seed {})",
        n,
        split.train.len(),
        split.test.len(),
        options.seed
    );
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pt_types::{PtError, Sample};

    fn numbered(n: usize) -> Dataset {
        (0..n)
            .map(|i| Sample::new(i as f32, 0.0, 0.0, 0.0))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn eighty_twenty_split_of_150_rows() {
        let split = train_test_split(&numbered(150), &SplitOptions::default()).unwrap();
        assert_eq!(split.train.len(), 120);
        assert_eq!(split.test.len(), 30);
    }

    #[test]
    fn same_seed_same_split() {
        let dataset = numbered(40);
        let options = SplitOptions::new(0.25).with_seed(7);
        let a = train_test_split(&dataset, &options).unwrap();
        let b = train_test_split(&dataset, &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_shuffles_differently() {
        let dataset = numbered(100);
        let a = train_test_split(&dataset, &SplitOptions::new(0.2).with_seed(1)).unwrap();
        let b = train_test_split(&dataset, &SplitOptions::new(0.2).with_seed(2)).unwrap();
        assert_ne!(a.train, b.train);
    }

    #[test]
    fn fraction_out_of_range_rejected() {
        for fraction in [0.0, 1.0, -0.5, f64::NAN] {
            let result = train_test_split(&numbered(10), &SplitOptions::new(fraction));
            assert!(matches!(
                result,
                Err(PtError::Data(DataError::InvalidSplit { .. }))
            ));
        }
    }

    #[test]
    fn single_row_cannot_be_split() {
        let result = train_test_split(&numbered(1), &SplitOptions::default());
        assert!(matches!(
            result,
            Err(PtError::Data(DataError::InsufficientData { .. }))
        ));
    }
}
