//! Model layer
//!
//! Random forest classification with probability calibration, plus the
//! splitters and metrics used to score it.

pub mod calibration;
pub mod cross_validation;
pub mod forest;
pub mod metrics;
pub mod tree;

pub use calibration::{CalibratedForest, IsotonicRegression};
pub use cross_validation::{train_test_split, CVSplit, StratifiedKFold};
pub use forest::{MaxFeatures, RandomForest};
pub use metrics::{
    cross_validate, probability_histogram, ProbabilityHistogram, ScoreStats, ValidationScores,
};
pub use tree::{DecisionTree, TreeNode};
