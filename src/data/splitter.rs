// ============================================================
// Layer 4 - Train/Validation/Test Splitter
// ============================================================
// Shuffles samples and divides them into three sets:
//   - training:   updates the weights
//   - validation: monitored after every epoch
//   - test:       touched once, after training finishes
//
// The shuffle is a seeded Fisher-Yates (rand's SliceRandom) so a
// given seed always reproduces the same split. Sentences from one
// novel are contiguous on disk; without shuffling the test set
// would be a single book.
//
// Sizes:
//   train      = round(n * train_fraction)
//   validation = round(n * validation_fraction), clamped to what is left
//   test       = everything else
//
// so the three parts always add up to n.
//
// Reference: rand crate documentation

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::sample::CorpusSplit;

pub fn split_three_way<T>(
    mut samples:         Vec<T>,
    train_fraction:      f64,
    validation_fraction: f64,
    seed:                u64,
) -> Result<CorpusSplit<T>> {
    ensure!(
        (0.0..=1.0).contains(&train_fraction) && (0.0..=1.0).contains(&validation_fraction),
        "split fractions must lie in [0, 1], got train={train_fraction} validation={validation_fraction}"
    );
    ensure!(
        train_fraction + validation_fraction <= 1.0 + f64::EPSILON,
        "train ({train_fraction}) + validation ({validation_fraction}) fractions exceed 1"
    );

    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total     = samples.len();
    let train_len = ((total as f64) * train_fraction).round() as usize;
    let train_len = train_len.min(total);
    let val_len   = ((total as f64) * validation_fraction).round() as usize;
    let val_len   = val_len.min(total - train_len);

    let mut rest   = samples.split_off(train_len);
    let test       = rest.split_off(val_len);
    let validation = rest;
    let train      = samples;

    tracing::debug!(
        "Dataset split: {} training, {} validation, {} test",
        train.len(),
        validation.len(),
        test.len(),
    );

    Ok(CorpusSplit { train, validation, test })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let split = split_three_way(items, 0.8, 0.1, 7).unwrap();
        assert_eq!(split.train.len(), 80);
        assert_eq!(split.validation.len(), 10);
        assert_eq!(split.test.len(), 10);
    }

    #[test]
    fn test_sizes_sum_to_input_when_rounding() {
        for n in 0..40 {
            let items: Vec<usize> = (0..n).collect();
            let split = split_three_way(items, 0.65, 0.35, 1).unwrap();
            assert_eq!(split.total(), n);
        }
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let split = split_three_way(items, 0.7, 0.2, 3).unwrap();
        let mut all: Vec<usize> = split
            .train
            .iter()
            .chain(&split.validation)
            .chain(&split.test)
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_three_way((0..30).collect::<Vec<u32>>(), 0.5, 0.25, 42).unwrap();
        let b = split_three_way((0..30).collect::<Vec<u32>>(), 0.5, 0.25, 42).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);
    }

    #[test]
    fn test_empty_dataset() {
        let split = split_three_way(Vec::<usize>::new(), 0.8, 0.1, 0).unwrap();
        assert_eq!(split.total(), 0);
    }

    #[test]
    fn test_invalid_fractions_rejected() {
        assert!(split_three_way(vec![1, 2, 3], 0.8, 0.3, 0).is_err());
        assert!(split_three_way(vec![1, 2, 3], -0.1, 0.3, 0).is_err());
    }
}
