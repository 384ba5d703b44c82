//! Binary classification decision tree
//!
//! CART-style tree with Gini splits. Leaves store the positive-class
//! fraction of their training samples rather than a hard class, so a tree
//! prediction is already a probability and attribution over the tree
//! structure sums exactly to the predicted value.

use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node holding the positive-class fraction
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with a `<= threshold` split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    /// Training-sample cover of this node.
    pub fn n_samples(&self) -> usize {
        match self {
            TreeNode::Leaf { n_samples, .. } => *n_samples,
            TreeNode::Split { n_samples, .. } => *n_samples,
        }
    }
}

/// Binary classification tree with probability leaves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Restrict splits to this feature subset, if set
    feature_subset: Option<Vec<usize>>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            feature_subset: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Restrict candidate split features to the given subset
    pub fn with_feature_subset(mut self, features: Vec<usize>) -> Self {
        self.feature_subset = Some(features);
        self
    }

    /// Fit the tree to training data with labels in {0, 1}.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(RiskError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(RiskError::TrainingError("no training samples".to_string()));
        }

        self.n_features = n_features;

        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let positives = count_positives(y, indices);

        let should_stop = n_samples < self.min_samples_split
            || self.max_depth.map_or(false, |d| depth >= d)
            || positives == 0
            || positives == n_samples;

        if should_stop {
            return TreeNode::Leaf {
                value: positives as f64 / n_samples as f64,
                n_samples,
            };
        }

        if let Some((best_feature, best_threshold, best_impurity)) =
            self.find_best_split(x, y, indices)
        {
            let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[[i, best_feature]] <= best_threshold);

            if left_indices.len() < self.min_samples_leaf
                || right_indices.len() < self.min_samples_leaf
            {
                return TreeNode::Leaf {
                    value: positives as f64 / n_samples as f64,
                    n_samples,
                };
            }

            let parent_impurity = gini(count_positives(y, indices), n_samples);
            let left_impurity = gini(count_positives(y, &left_indices), left_indices.len());
            let right_impurity = gini(count_positives(y, &right_indices), right_indices.len());
            let weighted_child_impurity = (left_indices.len() as f64 * left_impurity
                + right_indices.len() as f64 * right_impurity)
                / n_samples as f64;
            importances[best_feature] +=
                n_samples as f64 * (parent_impurity - weighted_child_impurity);

            let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances));
            let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances));

            TreeNode::Split {
                feature_idx: best_feature,
                threshold: best_threshold,
                left,
                right,
                n_samples,
                impurity: best_impurity,
            }
        } else {
            TreeNode::Leaf {
                value: positives as f64 / n_samples as f64,
                n_samples,
            }
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
    ) -> Option<(usize, f64, f64)> {
        let candidates: Vec<usize> = match &self.feature_subset {
            Some(subset) => subset.clone(),
            None => (0..x.ncols()).collect(),
        };

        let n = indices.len();
        let total_positives = count_positives(y, indices);
        let parent_impurity = gini(total_positives, n);

        let mut best: Option<(usize, f64, f64, f64)> = None;

        for feature_idx in candidates {
            let mut values: Vec<f64> = indices.iter().map(|&i| x[[i, feature_idx]]).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();

            for window in values.windows(2) {
                let threshold = (window[0] + window[1]) / 2.0;

                let mut left_count = 0usize;
                let mut left_positives = 0usize;
                for &idx in indices {
                    if x[[idx, feature_idx]] <= threshold {
                        left_count += 1;
                        if y[idx] > 0.5 {
                            left_positives += 1;
                        }
                    }
                }
                let right_count = n - left_count;
                if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                    continue;
                }

                let left_impurity = gini(left_positives, left_count);
                let right_impurity = gini(total_positives - left_positives, right_count);
                let weighted_impurity = (left_count as f64 * left_impurity
                    + right_count as f64 * right_impurity)
                    / n as f64;
                let gain = parent_impurity - weighted_impurity;

                if gain > 0.0 && best.map_or(true, |(_, _, _, g)| gain > g) {
                    best = Some((feature_idx, threshold, weighted_impurity, gain));
                }
            }
        }

        best.map(|(f, t, i, _)| (f, t, i))
    }

    /// Predicted positive-class probability for each row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(RiskError::ModelNotFitted)?;
        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| predict_row(root, x.row(i)))
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    /// Predicted positive-class probability for a single row.
    pub fn predict_proba_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let root = self.root.as_ref().ok_or(RiskError::ModelNotFitted)?;
        Ok(predict_row(root, row))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Fitted tree structure, for attribution walks.
    pub fn root(&self) -> Result<&TreeNode> {
        self.root.as_ref().ok_or(RiskError::ModelNotFitted)
    }

    /// Get tree depth
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, node_depth)
    }
}

fn predict_row(node: &TreeNode, row: ArrayView1<f64>) -> f64 {
    match node {
        TreeNode::Leaf { value, .. } => *value,
        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
            if row[*feature_idx] <= *threshold {
                predict_row(left, row)
            } else {
                predict_row(right, row)
            }
        }
    }
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn count_positives(y: &Array1<f64>, indices: &[usize]) -> usize {
    indices.iter().filter(|&&i| y[i] > 0.5).count()
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_separable_data() {
        let x = array![[0.0, 0.0], [0.1, 1.0], [0.9, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert!(proba[0] < 0.5);
        assert!(proba[3] > 0.5);
    }

    #[test]
    fn test_probability_leaves() {
        // not separable with one feature value, leaf holds the fraction
        let x = array![[1.0], [1.0], [1.0], [1.0]];
        let y = array![1.0, 1.0, 1.0, 0.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert!((proba[0] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 3); // root + 2 split levels

        let mut deep = DecisionTree::new();
        deep.fit(&x, &y).unwrap();
        assert!(deep.depth() >= tree.depth());
    }

    #[test]
    fn test_feature_subset_respected() {
        // feature 0 separates perfectly, feature 1 is noise
        let x = array![[0.0, 5.0], [0.0, 1.0], [1.0, 5.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new().with_feature_subset(vec![1]);
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 0.0);
    }

    #[test]
    fn test_covers_recorded() {
        let x = array![[0.0], [0.0], [1.0], [1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let root = tree.root().unwrap();
        assert_eq!(root.n_samples(), 4);
        if let TreeNode::Split { left, right, .. } = root {
            assert_eq!(left.n_samples() + right.n_samples(), 4);
        } else {
            panic!("expected a split at the root");
        }
    }

    #[test]
    fn test_unfitted_fails() {
        let tree = DecisionTree::new();
        let x = array![[0.0]];
        assert!(matches!(tree.predict_proba(&x), Err(RiskError::ModelNotFitted)));
    }
}
