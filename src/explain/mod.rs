//! Attribution engine
//!
//! Exact SHAP values over the fitted forest, plus the dataset-level
//! summaries built from them: mean-absolute importance, dependence
//! samples, partial dependence sweeps and seeded row samples.

mod tree_shap;

pub use tree_shap::TreeExplainer;

use crate::error::{Result, RiskError};
use crate::model::RandomForest;
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Align a raw contribution vector with the feature columns.
///
/// Some explainer outputs interleave per-class contributions, doubling
/// the array; in that layout the positive-class values sit at the even
/// offsets. Anything else that disagrees with the column count is a
/// hard error carrying both sides for diagnosis.
pub fn normalize_contributions(raw: &[f64], columns: &[String]) -> Result<Vec<f64>> {
    if raw.len() == columns.len() {
        return Ok(raw.to_vec());
    }
    if raw.len() == 2 * columns.len() {
        return Ok(raw.iter().step_by(2).copied().collect());
    }
    Err(RiskError::AttributionShapeMismatch {
        contributions_len: raw.len(),
        column_count: columns.len(),
        columns: columns.to_vec(),
        contributions: raw.to_vec(),
    })
}

/// Mean absolute contribution per column over a batch.
pub fn mean_abs_by_column(shap: &Array2<f64>) -> Array1<f64> {
    shap.map_axis(Axis(0), |col| {
        col.iter().map(|v| v.abs()).sum::<f64>() / col.len().max(1) as f64
    })
}

/// Column names ranked by mean absolute contribution, highest first.
pub fn rank_columns(importance: &Array1<f64>, columns: &[String], top_n: usize) -> Vec<(String, f64)> {
    let mut order: Vec<usize> = (0..importance.len()).collect();
    order.sort_by(|&a, &b| {
        importance[b]
            .partial_cmp(&importance[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
        .into_iter()
        .take(top_n)
        .map(|i| (columns[i].clone(), importance[i]))
        .collect()
}

/// Paired (feature value, contribution) samples for one column, taken
/// from the first `cap` rows.
pub fn dependence_samples(
    x: &Array2<f64>,
    shap: &Array2<f64>,
    column: usize,
    cap: usize,
) -> Vec<(f64, f64)> {
    let n = x.nrows().min(cap);
    (0..n).map(|i| (x[[i, column]], shap[[i, column]])).collect()
}

/// Partial dependence of the forest probability on one column.
///
/// Sweeps the column over `n_steps` equally spaced values spanning its
/// observed range, overwriting it across all rows and averaging the
/// forest's probability at each step.
pub fn partial_dependence(
    forest: &RandomForest,
    x: &Array2<f64>,
    column: usize,
    n_steps: usize,
) -> Result<Vec<(f64, f64)>> {
    if x.nrows() == 0 || n_steps == 0 {
        return Ok(Vec::new());
    }

    let values = x.column(column);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut curve = Vec::with_capacity(n_steps);
    let mut grid = x.to_owned();
    for step in 0..n_steps {
        let value = if n_steps == 1 {
            min
        } else {
            min + (max - min) * step as f64 / (n_steps - 1) as f64
        };
        grid.column_mut(column).fill(value);
        let mean = forest.predict_proba(&grid)?.mean().unwrap_or(0.0);
        curve.push((value, mean));
    }
    Ok(curve)
}

/// Draw up to `cap` distinct row indices under the seed.
pub fn sample_rows(n_rows: usize, cap: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let amount = cap.min(n_rows);
    let mut indices = rand::seq::index::sample(&mut rng, n_rows, amount).into_vec();
    indices.sort_unstable();
    indices
}
