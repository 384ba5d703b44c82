//! Metrics report payload

use crate::model::{ProbabilityHistogram, ScoreStats, ValidationScores};
use serde::{Deserialize, Serialize};

/// Mean/std pair for one scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
}

impl From<ScoreStats> for MetricSummary {
    fn from(stats: ScoreStats) -> Self {
        Self { mean: stats.mean, std: stats.std }
    }
}

/// Cross-validated scores block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsBlock {
    pub accuracy: MetricSummary,
    pub precision: MetricSummary,
    pub recall: MetricSummary,
    pub f1: MetricSummary,
    pub roc_auc: MetricSummary,
}

impl From<ValidationScores> for MetricsBlock {
    fn from(scores: ValidationScores) -> Self {
        Self {
            accuracy: scores.accuracy.into(),
            precision: scores.precision.into(),
            recall: scores.recall.into(),
            f1: scores.f1.into(),
            roc_auc: scores.roc_auc.into(),
        }
    }
}

/// Probability histogram block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbDist {
    pub hist: Vec<usize>,
    pub bin_edges: Vec<f64>,
}

impl From<ProbabilityHistogram> for ProbDist {
    fn from(h: ProbabilityHistogram) -> Self {
        Self { hist: h.hist, bin_edges: h.bin_edges }
    }
}

/// One ranked feature importance entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// One (age, contribution) dependence sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencePoint {
    pub age: f64,
    pub shap: f64,
}

/// One point of the calcium-intake partial dependence sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialDependencePoint {
    pub calcium: f64,
    pub pred: f64,
}

/// Full payload of the data-science metrics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub metrics: MetricsBlock,
    pub prob_dist: ProbDist,
    pub feature_importance: Vec<FeatureImportance>,
    pub shap_dependence: Vec<DependencePoint>,
    pub partial_dependence: Vec<PartialDependencePoint>,
    pub y_proba: Vec<f64>,
    pub first_patient_risk: Option<f64>,
    pub first_patient_shap: Vec<f64>,
    pub first_patient_features: Vec<String>,
    pub shap_base_value: Option<f64>,
    pub sample_shap_values: Vec<f64>,
    pub sample_features: Vec<String>,
}
