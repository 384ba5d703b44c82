//! Cross-validation splitters

use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified k-fold splitter.
///
/// Samples are grouped by class, shuffled within each class under the
/// seed, then dealt round-robin to folds so every fold keeps close to the
/// overall class balance.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    random_state: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits, random_state: 42 }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Generate train/test splits over labels in {0, 1}.
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        if self.n_splits < 2 {
            return Err(RiskError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < self.n_splits {
            return Err(RiskError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, self.n_splits
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        let mut negatives: Vec<usize> = Vec::new();
        let mut positives: Vec<usize> = Vec::new();
        for (idx, &val) in y.iter().enumerate() {
            if val > 0.5 {
                positives.push(idx);
            } else {
                negatives.push(idx);
            }
        }
        negatives.shuffle(&mut rng);
        positives.shuffle(&mut rng);

        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        for class in [&negatives, &positives] {
            for (i, &idx) in class.iter().enumerate() {
                folds[i % self.n_splits].push(idx);
            }
        }

        let splits = folds
            .iter()
            .enumerate()
            .map(|(fold_idx, test_indices)| {
                let train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != fold_idx)
                    .flat_map(|(_, fold)| fold.iter().copied())
                    .collect();
                CVSplit {
                    train_indices,
                    test_indices: test_indices.clone(),
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}

/// Select rows of a matrix and label vector by index.
pub fn take_rows(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
) -> (Array2<f64>, Array1<f64>) {
    let x_sub = x.select(Axis(0), indices);
    let y_sub = Array1::from_vec(indices.iter().map(|&i| y[i]).collect());
    (x_sub, y_sub)
}

/// Shuffled train/test split with the given test fraction.
pub fn train_test_split(
    n_samples: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(RiskError::ValidationError(format!(
            "test_fraction must be in [0, 1), got {}",
            test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n_samples as f64) * test_fraction).round() as usize;
    let n_test = n_test.min(n_samples.saturating_sub(1));
    let test = indices.split_off(n_samples - n_test);
    Ok((indices, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn labels(positives: usize, negatives: usize) -> Array1<f64> {
        let mut y = vec![1.0; positives];
        y.extend(vec![0.0; negatives]);
        Array1::from_vec(y)
    }

    #[test]
    fn test_splits_cover_all_samples() {
        let y = labels(30, 20);
        let splits = StratifiedKFold::new(5).split(&y).unwrap();
        assert_eq!(splits.len(), 5);

        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_train_test_disjoint() {
        let y = labels(30, 20);
        for split in StratifiedKFold::new(5).split(&y).unwrap() {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 50);
            for idx in &split.test_indices {
                assert!(!split.train_indices.contains(idx));
            }
        }
    }

    #[test]
    fn test_folds_keep_class_balance() {
        let y = labels(25, 25);
        for split in StratifiedKFold::new(5).split(&y).unwrap() {
            let fold_positives =
                split.test_indices.iter().filter(|&&i| y[i] > 0.5).count();
            assert_eq!(fold_positives, 5);
        }
    }

    #[test]
    fn test_deterministic_under_seed() {
        let y = labels(13, 17);
        let a = StratifiedKFold::new(3).with_random_state(9).split(&y).unwrap();
        let b = StratifiedKFold::new(3).with_random_state(9).split(&y).unwrap();
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.test_indices, sb.test_indices);
        }
    }

    #[test]
    fn test_too_few_samples() {
        let y = labels(1, 1);
        assert!(StratifiedKFold::new(5).split(&y).is_err());
    }

    #[test]
    fn test_train_test_split_sizes() {
        let (train, test) = train_test_split(100, 0.2, 42).unwrap();
        assert_eq!(test.len(), 20);
        assert_eq!(train.len(), 80);
        for idx in &test {
            assert!(!train.contains(idx));
        }
    }
}
