//! Classification metrics and cross-validated scoring

use super::cross_validation::{take_rows, StratifiedKFold};
use super::forest::RandomForest;
use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Fraction of predictions matching the labels.
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (**t > 0.5) == (**p > 0.5))
        .count();
    correct as f64 / y_true.len() as f64
}

/// Positive predictive value. Zero when nothing was predicted positive.
pub fn precision(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let (tp, fp) = y_true.iter().zip(y_pred.iter()).fold((0, 0), |(tp, fp), (t, p)| {
        if *p > 0.5 {
            if *t > 0.5 { (tp + 1, fp) } else { (tp, fp + 1) }
        } else {
            (tp, fp)
        }
    });
    if tp + fp == 0 {
        0.0
    } else {
        tp as f64 / (tp + fp) as f64
    }
}

/// True positive rate. Zero when no positives exist.
pub fn recall(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let (tp, fneg) = y_true.iter().zip(y_pred.iter()).fold((0, 0), |(tp, fneg), (t, p)| {
        if *t > 0.5 {
            if *p > 0.5 { (tp + 1, fneg) } else { (tp, fneg + 1) }
        } else {
            (tp, fneg)
        }
    });
    if tp + fneg == 0 {
        0.0
    } else {
        tp as f64 / (tp + fneg) as f64
    }
}

/// Harmonic mean of precision and recall.
pub fn f1_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let p = precision(y_true, y_pred);
    let r = recall(y_true, y_pred);
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

/// Area under the ROC curve via the rank-sum formulation.
///
/// Ties in the scores receive averaged ranks. Returns 0.5 when only one
/// class is present, where the curve is undefined.
pub fn roc_auc(y_true: &Array1<f64>, y_score: &Array1<f64>) -> f64 {
    let n = y_true.len();
    let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        y_score[a].partial_cmp(&y_score[b]).unwrap_or(std::cmp::Ordering::Equal)
    });

    // average ranks over tied score groups
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && (y_score[order[j + 1]] - y_score[order[i]]).abs() < 1e-12 {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(t, _)| **t > 0.5)
        .map(|(_, r)| r)
        .sum();

    (rank_sum - n_pos as f64 * (n_pos as f64 + 1.0) / 2.0) / (n_pos as f64 * n_neg as f64)
}

/// Mean and population standard deviation of per-fold scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreStats {
    pub mean: f64,
    pub std: f64,
}

impl ScoreStats {
    fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self { mean: 0.0, std: 0.0 };
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let var = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self { mean, std: var.sqrt() }
    }
}

/// Cross-validated scores for the five standard metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationScores {
    pub accuracy: ScoreStats,
    pub precision: ScoreStats,
    pub recall: ScoreStats,
    pub f1: ScoreStats,
    pub roc_auc: ScoreStats,
}

/// Score a forest template over stratified k-fold cross-validation.
///
/// One forest is fitted per fold and supplies all five metrics for that
/// fold, rather than refitting per metric.
pub fn cross_validate(
    template: &RandomForest,
    x: &Array2<f64>,
    y: &Array1<f64>,
    n_folds: usize,
) -> Result<ValidationScores> {
    let splits = StratifiedKFold::new(n_folds)
        .with_random_state(template.random_state)
        .split(y)?;

    let mut accuracies = Vec::with_capacity(n_folds);
    let mut precisions = Vec::with_capacity(n_folds);
    let mut recalls = Vec::with_capacity(n_folds);
    let mut f1s = Vec::with_capacity(n_folds);
    let mut aucs = Vec::with_capacity(n_folds);

    for split in &splits {
        let (x_train, y_train) = take_rows(x, y, &split.train_indices);
        let (x_test, y_test) = take_rows(x, y, &split.test_indices);

        let mut forest = template.clone();
        forest.fit(&x_train, &y_train)?;
        let proba = forest.predict_proba(&x_test)?;
        let pred = proba.mapv(|p| f64::from(p > 0.5));

        accuracies.push(accuracy(&y_test, &pred));
        precisions.push(precision(&y_test, &pred));
        recalls.push(recall(&y_test, &pred));
        f1s.push(f1_score(&y_test, &pred));
        aucs.push(roc_auc(&y_test, &proba));
    }

    Ok(ValidationScores {
        accuracy: ScoreStats::from_scores(&accuracies),
        precision: ScoreStats::from_scores(&precisions),
        recall: ScoreStats::from_scores(&recalls),
        f1: ScoreStats::from_scores(&f1s),
        roc_auc: ScoreStats::from_scores(&aucs),
    })
}

/// Histogram of probabilities over equal-width bins spanning [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbabilityHistogram {
    pub hist: Vec<usize>,
    pub bin_edges: Vec<f64>,
}

/// Bin probabilities into `n_bins` equal-width bins over [0, 1].
///
/// The last bin includes its right edge so a probability of exactly 1.0
/// is counted.
pub fn probability_histogram(proba: &Array1<f64>, n_bins: usize) -> Result<ProbabilityHistogram> {
    if n_bins == 0 {
        return Err(RiskError::ValidationError("n_bins must be positive".to_string()));
    }

    let bin_edges: Vec<f64> = (0..=n_bins).map(|i| i as f64 / n_bins as f64).collect();
    let mut hist = vec![0usize; n_bins];
    for &p in proba {
        let clamped = p.clamp(0.0, 1.0);
        let bin = ((clamped * n_bins as f64) as usize).min(n_bins - 1);
        hist[bin] += 1;
    }

    Ok(ProbabilityHistogram { hist, bin_edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        let y_true = array![1.0, 0.0, 1.0, 0.0];
        let y_pred = array![1.0, 0.0, 0.0, 0.0];
        assert!((accuracy(&y_true, &y_pred) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_precision_recall_f1() {
        // tp=2, fp=1, fn=1
        let y_true = array![1.0, 1.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 1.0, 0.0, 1.0, 0.0];
        assert!((precision(&y_true, &y_pred) - 2.0 / 3.0).abs() < 1e-12);
        assert!((recall(&y_true, &y_pred) - 2.0 / 3.0).abs() < 1e-12);
        assert!((f1_score(&y_true, &y_pred) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_precision_no_positive_predictions() {
        let y_true = array![1.0, 0.0];
        let y_pred = array![0.0, 0.0];
        assert_eq!(precision(&y_true, &y_pred), 0.0);
        assert_eq!(f1_score(&y_true, &y_pred), 0.0);
    }

    #[test]
    fn test_roc_auc_perfect_ranking() {
        let y_true = array![0.0, 0.0, 1.0, 1.0];
        let y_score = array![0.1, 0.2, 0.8, 0.9];
        assert!((roc_auc(&y_true, &y_score) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_ties_averaged() {
        // all scores tied: AUC must be exactly 0.5
        let y_true = array![0.0, 1.0, 0.0, 1.0];
        let y_score = array![0.5, 0.5, 0.5, 0.5];
        assert!((roc_auc(&y_true, &y_score) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_single_class() {
        let y_true = array![1.0, 1.0];
        let y_score = array![0.4, 0.6];
        assert_eq!(roc_auc(&y_true, &y_score), 0.5);
    }

    #[test]
    fn test_score_stats_population_std() {
        let stats = ScoreStats::from_scores(&[0.5, 0.7]);
        assert!((stats.mean - 0.6).abs() < 1e-12);
        assert!((stats.std - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_histogram_counts_and_edges() {
        let proba = array![0.0, 0.05, 0.5, 0.95, 1.0];
        let result = probability_histogram(&proba, 10).unwrap();
        assert_eq!(result.hist.iter().sum::<usize>(), 5);
        assert_eq!(result.bin_edges.len(), 11);
        assert_eq!(result.hist[0], 2);
        assert_eq!(result.hist[5], 1);
        // exact 1.0 lands in the final bin
        assert_eq!(result.hist[9], 2);
    }

    #[test]
    fn test_cross_validate_separable() {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..15 {
            rows.extend([i as f64 * 0.01, 0.0]);
            labels.push(0.0);
            rows.extend([1.0 + i as f64 * 0.01, 1.0]);
            labels.push(1.0);
        }
        let x = Array2::from_shape_vec((30, 2), rows).unwrap();
        let y = Array1::from_vec(labels);

        let template = RandomForest::new(10).with_random_state(42);
        let scores = cross_validate(&template, &x, &y, 5).unwrap();

        assert!(scores.accuracy.mean > 0.8);
        assert!(scores.roc_auc.mean > 0.8);
        assert!(scores.accuracy.std >= 0.0);
    }
}
