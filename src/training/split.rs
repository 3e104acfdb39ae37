//! Train/evaluation partitioning
//!
//! Every splitter returns index lists into the dataset, never copies of it.

use crate::data::Dataset;
use crate::error::{Result, YieldError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A single train/evaluation partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// Shown in reports: `holdout`, a year, or `fold_<k>`
    pub label: String,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Seeded random holdout split.
///
/// The evaluation partition gets `ceil(n * test_fraction)` records.
pub fn holdout_split(n_samples: usize, test_fraction: f64, seed: u64) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(YieldError::InvalidParameter {
            name: "test_fraction".to_string(),
            value: test_fraction.to_string(),
            reason: "must lie strictly between 0 and 1".to_string(),
        });
    }

    let n_test = (n_samples as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(YieldError::InvalidParameter {
            name: "test_fraction".to_string(),
            value: test_fraction.to_string(),
            reason: format!(
                "{} records leave an empty training or evaluation partition",
                n_samples
            ),
        });
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_indices = indices[..n_test].to_vec();
    let train_indices = indices[n_test..].to_vec();

    Ok(Split {
        label: "holdout".to_string(),
        train_indices,
        test_indices,
    })
}

/// Year-over-year splits plus the years that could not be evaluated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporalSplits {
    pub splits: Vec<Split>,
    pub skipped: Vec<i32>,
}

/// Expanding-window splits: for each year after the first, train on every
/// earlier year and evaluate on that year.
///
/// `timestamp_column` only names the source column in the error raised when
/// records lack a year.
pub fn temporal_splits(dataset: &Dataset, timestamp_column: &str) -> Result<TemporalSplits> {
    if !dataset.has_years() {
        return Err(YieldError::missing_column(
            timestamp_column,
            "temporal evaluation needs a calendar year on every record",
        ));
    }

    let years = dataset.years();
    let mut result = TemporalSplits::default();

    for &target in years.iter().skip(1) {
        let mut train_indices = Vec::new();
        let mut test_indices = Vec::new();
        for (i, record) in dataset.records().iter().enumerate() {
            match record.year {
                Some(y) if y < target => train_indices.push(i),
                Some(y) if y == target => test_indices.push(i),
                _ => {}
            }
        }

        if train_indices.is_empty() || test_indices.is_empty() {
            warn!(
                year = target,
                n_train = train_indices.len(),
                n_test = test_indices.len(),
                "skipping year with an empty partition"
            );
            result.skipped.push(target);
            continue;
        }

        result.splits.push(Split {
            label: target.to_string(),
            train_indices,
            test_indices,
        });
    }

    Ok(result)
}

/// Shuffled k-fold splits; fold sizes differ by at most one
pub fn k_fold_splits(n_samples: usize, n_splits: usize, seed: u64) -> Result<Vec<Split>> {
    if n_splits < 2 {
        return Err(YieldError::InvalidParameter {
            name: "n_splits".to_string(),
            value: n_splits.to_string(),
            reason: "must be at least 2".to_string(),
        });
    }
    if n_samples < n_splits {
        return Err(YieldError::InvalidParameter {
            name: "n_splits".to_string(),
            value: n_splits.to_string(),
            reason: format!("n_samples ({}) must be >= n_splits", n_samples),
        });
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let base = n_samples / n_splits;
    let remainder = n_samples % n_splits;

    let mut splits = Vec::with_capacity(n_splits);
    let mut current = 0;

    for fold_idx in 0..n_splits {
        let fold_size = if fold_idx < remainder { base + 1 } else { base };
        let test_indices = indices[current..current + fold_size].to_vec();
        let train_indices = indices[..current]
            .iter()
            .chain(indices[current + fold_size..].iter())
            .copied()
            .collect();

        splits.push(Split {
            label: format!("fold_{}", fold_idx + 1),
            train_indices,
            test_indices,
        });
        current += fold_size;
    }

    Ok(splits)
}
