//! Exact SHAP values for tree ensembles
//!
//! Implements the polynomial-time TreeSHAP recursion over fitted trees.
//! Each tree walk maintains a path of unique features with their covered
//! fractions and permutation weights; leaves pay out contributions by
//! unwinding each feature from the path. Per-tree values are averaged, so
//! the base value plus the per-feature contributions equals the forest's
//! uncalibrated probability exactly.

use crate::error::{Result, RiskError};
use crate::model::{RandomForest, TreeNode};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;

/// One unique feature on the decision path.
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// Feature split on, `None` for the path root sentinel
    feature_index: Option<usize>,
    /// Fraction of cover flowing through when the feature is unknown
    zero_fraction: f64,
    /// Whether the sample follows this branch (1.0) or not (0.0)
    one_fraction: f64,
    /// Permutation weight of subsets of this size
    pweight: f64,
}

/// SHAP explainer over a fitted random forest.
#[derive(Debug, Clone)]
pub struct TreeExplainer<'a> {
    forest: &'a RandomForest,
    expected_value: f64,
}

impl<'a> TreeExplainer<'a> {
    /// Build an explainer; fails on an unfitted forest.
    pub fn new(forest: &'a RandomForest) -> Result<Self> {
        if forest.n_trees() == 0 {
            return Err(RiskError::ModelNotFitted);
        }
        let mut total = 0.0;
        for tree in forest.trees() {
            let root = tree.root()?;
            total += cover_weighted_mean(root);
        }
        Ok(Self {
            forest,
            expected_value: total / forest.n_trees() as f64,
        })
    }

    /// The model's mean prediction over its training distribution.
    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    /// Per-feature contributions for a single row.
    pub fn shap_values_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        let n_features = row.len();
        let mut phi = Array1::zeros(n_features);
        for tree in self.forest.trees() {
            let root = tree.root()?;
            let mut tree_phi = vec![0.0; n_features];
            recurse(root, &row, &mut tree_phi, &[], 1.0, 1.0, None);
            for (slot, val) in phi.iter_mut().zip(tree_phi.iter()) {
                *slot += val;
            }
        }
        Ok(phi / self.forest.n_trees() as f64)
    }

    /// Contribution matrix for a batch of rows.
    pub fn shap_values(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let rows: Result<Vec<Array1<f64>>> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.shap_values_row(x.row(i)))
            .collect();
        let rows = rows?;

        let mut out = Array2::zeros((x.nrows(), x.ncols()));
        for (i, row) in rows.into_iter().enumerate() {
            out.row_mut(i).assign(&row);
        }
        Ok(out)
    }
}

/// Cover-weighted mean of a tree's leaf values.
fn cover_weighted_mean(node: &TreeNode) -> f64 {
    fn weighted_sum(node: &TreeNode) -> f64 {
        match node {
            TreeNode::Leaf { value, n_samples } => value * *n_samples as f64,
            TreeNode::Split { left, right, .. } => weighted_sum(left) + weighted_sum(right),
        }
    }
    weighted_sum(node) / node.n_samples() as f64
}

fn recurse(
    node: &TreeNode,
    x: &ArrayView1<f64>,
    phi: &mut [f64],
    parent_path: &[PathElement],
    zero_fraction: f64,
    one_fraction: f64,
    feature_index: Option<usize>,
) {
    let mut path = parent_path.to_vec();
    extend(&mut path, zero_fraction, one_fraction, feature_index);

    match node {
        TreeNode::Leaf { value, .. } => {
            for i in 1..path.len() {
                let weight = unwound_path_sum(&path, i);
                let el = &path[i];
                if let Some(feature) = el.feature_index {
                    phi[feature] += weight * (el.one_fraction - el.zero_fraction) * value;
                }
            }
        }
        TreeNode::Split { feature_idx, threshold, left, right, n_samples, .. } => {
            let (hot, cold) = if x[*feature_idx] <= *threshold {
                (left.as_ref(), right.as_ref())
            } else {
                (right.as_ref(), left.as_ref())
            };
            let cover = *n_samples as f64;
            let hot_zero = hot.n_samples() as f64 / cover;
            let cold_zero = cold.n_samples() as f64 / cover;

            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;
            // a feature already on the path is unwound before re-splitting
            if let Some(k) = path
                .iter()
                .position(|el| el.feature_index == Some(*feature_idx))
            {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind(&mut path, k);
            }

            recurse(hot, x, phi, &path, hot_zero * incoming_zero, incoming_one, Some(*feature_idx));
            recurse(cold, x, phi, &path, cold_zero * incoming_zero, 0.0, Some(*feature_idx));
        }
    }
}

fn extend(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature_index: Option<usize>,
) {
    let pweight = if path.is_empty() { 1.0 } else { 0.0 };
    path.push(PathElement { feature_index, zero_fraction, one_fraction, pweight });

    let len = path.len() as f64;
    for i in (0..path.len() - 1).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i as f64 + 1.0) / len;
        path[i].pweight = zero_fraction * path[i].pweight * (len - 1.0 - i as f64) / len;
    }
}

fn unwind(path: &mut Vec<PathElement>, index: usize) {
    let unique_depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[unique_depth].pweight;

    for j in (0..unique_depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[j].pweight;
            path[j].pweight =
                next_one_portion * (unique_depth as f64 + 1.0) / ((j as f64 + 1.0) * one_fraction);
            next_one_portion = tmp
                - path[j].pweight * zero_fraction * (unique_depth as f64 - j as f64)
                    / (unique_depth as f64 + 1.0);
        } else {
            path[j].pweight = path[j].pweight * (unique_depth as f64 + 1.0)
                / (zero_fraction * (unique_depth as f64 - j as f64));
        }
    }

    for j in index..unique_depth {
        path[j].feature_index = path[j + 1].feature_index;
        path[j].zero_fraction = path[j + 1].zero_fraction;
        path[j].one_fraction = path[j + 1].one_fraction;
    }
    path.pop();
}

fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let unique_depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[unique_depth].pweight;
    let mut total = 0.0;

    for j in (0..unique_depth).rev() {
        if one_fraction != 0.0 {
            let tmp =
                next_one_portion * (unique_depth as f64 + 1.0) / ((j as f64 + 1.0) * one_fraction);
            total += tmp;
            next_one_portion = path[j].pweight
                - tmp * zero_fraction * (unique_depth as f64 - j as f64)
                    / (unique_depth as f64 + 1.0);
        } else {
            total += path[j].pweight
                / (zero_fraction * (unique_depth as f64 - j as f64)
                    / (unique_depth as f64 + 1.0));
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};

    fn fitted_forest() -> (RandomForest, Array2<f64>, Array1<f64>) {
        let x = array![
            [20.0, 0.0, 1.0],
            [25.0, 0.0, 0.0],
            [30.0, 1.0, 1.0],
            [35.0, 0.0, 0.0],
            [60.0, 1.0, 1.0],
            [65.0, 1.0, 0.0],
            [70.0, 0.0, 1.0],
            [75.0, 1.0, 0.0],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let mut forest = RandomForest::new(15).with_random_state(42);
        forest.fit(&x, &y).unwrap();
        (forest, x, y)
    }

    #[test]
    fn test_additivity() {
        let (forest, x, _) = fitted_forest();
        let explainer = TreeExplainer::new(&forest).unwrap();
        let proba = forest.predict_proba(&x).unwrap();

        for i in 0..x.nrows() {
            let phi = explainer.shap_values_row(x.row(i)).unwrap();
            let reconstructed = explainer.expected_value() + phi.sum();
            assert!(
                (reconstructed - proba[i]).abs() < 1e-9,
                "row {}: {} vs {}",
                i,
                reconstructed,
                proba[i]
            );
        }
    }

    #[test]
    fn test_batch_matches_rows() {
        let (forest, x, _) = fitted_forest();
        let explainer = TreeExplainer::new(&forest).unwrap();
        let batch = explainer.shap_values(&x).unwrap();

        for i in 0..x.nrows() {
            let row = explainer.shap_values_row(x.row(i)).unwrap();
            for j in 0..x.ncols() {
                assert!((batch[[i, j]] - row[j]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_single_stump_contributions() {
        // one tree split on feature 0 at 0.5, leaves are pure
        let x = array![[0.0], [0.0], [1.0], [1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut forest = RandomForest::new(1).with_random_state(0);
        forest.bootstrap = false;
        forest.fit(&x, &y).unwrap();

        let explainer = TreeExplainer::new(&forest).unwrap();
        assert!((explainer.expected_value() - 0.5).abs() < 1e-12);

        let phi = explainer.shap_values_row(x.row(3)).unwrap();
        // 0.5 base + 0.5 contribution reaches the positive leaf
        assert!((phi[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_constant_feature_gets_zero() {
        // feature 1 never varies, so it cannot carry credit
        let x = array![[0.0, 3.0], [0.2, 3.0], [0.8, 3.0], [1.0, 3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut forest = RandomForest::new(10).with_random_state(42);
        forest.fit(&x, &y).unwrap();

        let explainer = TreeExplainer::new(&forest).unwrap();
        for i in 0..x.nrows() {
            let phi = explainer.shap_values_row(x.row(i)).unwrap();
            assert!(phi[1].abs() < 1e-12);
        }
    }

    #[test]
    fn test_unfitted_forest_fails() {
        let forest = RandomForest::new(5);
        assert!(matches!(TreeExplainer::new(&forest), Err(RiskError::ModelNotFitted)));
    }
}
