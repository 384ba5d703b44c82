//! Probability calibration
//!
//! Isotonic regression fitted on out-of-fold predictions, wrapped around a
//! base forest. Raw forest probabilities tend to bunch toward the middle;
//! the isotonic map stretches them toward the observed positive rates.

use super::cross_validation::{take_rows, StratifiedKFold};
use super::forest::RandomForest;
use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Isotonic regression calibrator
///
/// Non-parametric calibration that fits a monotonically increasing
/// step function via pool adjacent violators, with linear interpolation
/// between knots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsotonicRegression {
    x_values: Option<Vec<f64>>,
    y_values: Option<Vec<f64>>,
}

impl IsotonicRegression {
    pub fn new() -> Self {
        Self { x_values: None, y_values: None }
    }

    /// Fit the calibration map from raw probabilities to labels.
    pub fn fit(&mut self, probs: &Array1<f64>, labels: &Array1<f64>) -> Result<()> {
        let n = probs.len();
        if n != labels.len() {
            return Err(RiskError::ValidationError(
                "probabilities and labels must have same length".to_string(),
            ));
        }
        if n == 0 {
            return Err(RiskError::ValidationError(
                "cannot calibrate on empty input".to_string(),
            ));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        indices.sort_by(|&a, &b| {
            probs[a].partial_cmp(&probs[b]).unwrap_or(std::cmp::Ordering::Equal)
        });

        let x_sorted: Vec<f64> = indices.iter().map(|&i| probs[i]).collect();
        let y_sorted: Vec<f64> = indices.iter().map(|&i| labels[i]).collect();

        let y_isotonic = pava(&y_sorted);

        self.x_values = Some(x_sorted);
        self.y_values = Some(y_isotonic);
        Ok(())
    }

    /// Map a raw probability through the fitted step function.
    pub fn calibrate_one(&self, p: f64) -> Result<f64> {
        let x_vals = self.x_values.as_ref().ok_or(RiskError::ModelNotFitted)?;
        let y_vals = self.y_values.as_ref().ok_or(RiskError::ModelNotFitted)?;
        Ok(interpolate(x_vals, y_vals, p).clamp(0.0, 1.0))
    }

    /// Map a batch of raw probabilities.
    pub fn calibrate(&self, probs: &Array1<f64>) -> Result<Array1<f64>> {
        probs.iter().map(|&p| self.calibrate_one(p)).collect()
    }
}

impl Default for IsotonicRegression {
    fn default() -> Self {
        Self::new()
    }
}

/// Pool adjacent violators over values sorted by predictor.
///
/// Maintains weighted pools; whenever a pool mean drops below its
/// predecessor the two merge, and merges cascade backwards. The expanded
/// result is non-decreasing.
fn pava(y: &[f64]) -> Vec<f64> {
    // (mean, weight) per pool
    let mut pools: Vec<(f64, f64)> = Vec::with_capacity(y.len());
    for &value in y {
        pools.push((value, 1.0));
        while pools.len() >= 2 {
            let (mean_b, w_b) = pools[pools.len() - 1];
            let (mean_a, w_a) = pools[pools.len() - 2];
            if mean_a <= mean_b {
                break;
            }
            pools.pop();
            pools.pop();
            let w = w_a + w_b;
            pools.push(((mean_a * w_a + mean_b * w_b) / w, w));
        }
    }

    let mut result = Vec::with_capacity(y.len());
    for (mean, weight) in pools {
        for _ in 0..(weight.round() as usize) {
            result.push(mean);
        }
    }
    result
}

fn interpolate(x_vals: &[f64], y_vals: &[f64], x: f64) -> f64 {
    if x <= x_vals[0] {
        return y_vals[0];
    }
    let last = x_vals.len() - 1;
    if x >= x_vals[last] {
        return y_vals[last];
    }

    let mut lo = 0;
    let mut hi = last;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if x_vals[mid] <= x {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let (x0, x1) = (x_vals[lo], x_vals[hi]);
    let (y0, y1) = (y_vals[lo], y_vals[hi]);
    if (x1 - x0).abs() < 1e-10 {
        return y0;
    }
    y0 + (x - x0) / (x1 - x0) * (y1 - y0)
}

/// A random forest with an isotonic calibration map on its output.
///
/// The base forest is fitted on all rows. The calibration map is fitted
/// on out-of-fold probabilities pooled across a stratified k-fold pass,
/// so the isotonic fit never sees probabilities the forest produced for
/// its own training rows.
#[derive(Debug, Clone)]
pub struct CalibratedForest {
    forest: RandomForest,
    calibrator: IsotonicRegression,
}

impl CalibratedForest {
    /// Fit the forest and its calibration map.
    ///
    /// `template` supplies the forest hyperparameters; fold forests are
    /// clones of it refitted on each fold's training rows.
    pub fn fit(
        template: &RandomForest,
        x: &Array2<f64>,
        y: &Array1<f64>,
        n_folds: usize,
    ) -> Result<Self> {
        let mut forest = template.clone();
        forest.fit(x, y)?;

        let splits = StratifiedKFold::new(n_folds)
            .with_random_state(template.random_state)
            .split(y)?;

        let mut oof_probs = Vec::with_capacity(y.len());
        let mut oof_labels = Vec::with_capacity(y.len());
        for split in &splits {
            let (x_train, y_train) = take_rows(x, y, &split.train_indices);
            let (x_test, y_test) = take_rows(x, y, &split.test_indices);

            let mut fold_forest = template.clone();
            fold_forest.fit(&x_train, &y_train)?;
            let probs = fold_forest.predict_proba(&x_test)?;

            oof_probs.extend(probs.iter().copied());
            oof_labels.extend(y_test.iter().copied());
        }

        let mut calibrator = IsotonicRegression::new();
        calibrator.fit(&Array1::from_vec(oof_probs), &Array1::from_vec(oof_labels))?;

        Ok(Self { forest, calibrator })
    }

    /// Calibrated positive-class probability for each row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let raw = self.forest.predict_proba(x)?;
        self.calibrator.calibrate(&raw)
    }

    /// Calibrated probability for a single row.
    pub fn predict_proba_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let raw = self.forest.predict_proba_row(row)?;
        self.calibrator.calibrate_one(raw)
    }

    /// The underlying uncalibrated forest.
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }
}
