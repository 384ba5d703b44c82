//! Per-request prediction pipeline
//!
//! Every call trains from scratch: load (or synthesize) the dataset,
//! top up sparse negatives, balance classes, one-hot encode, fit the
//! forest and run attribution. Nothing is cached between requests, so
//! two calls with the same seed produce identical output.

mod report;

pub use report::{
    DependencePoint, FeatureImportance, MetricSummary, MetricsBlock, MetricsReport,
    PartialDependencePoint, ProbDist,
};

use crate::dataset::{
    augment_negatives, balance, DatasetProvider, PatientRecord, SynthesisConfig, AGE_COLUMN,
};
use crate::encoding::FeatureEncoder;
use crate::error::Result;
use crate::explain::{
    dependence_samples, mean_abs_by_column, normalize_contributions, partial_dependence,
    rank_columns, sample_rows, TreeExplainer,
};
use crate::model::{
    cross_validate, probability_histogram, train_test_split, CalibratedForest, RandomForest,
};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Encoded column swept by the partial dependence curve.
const PARTIAL_DEPENDENCE_COLUMN: &str = "Calcium Intake_Low";

/// Tuning knobs for the per-request pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub seed: u64,
    pub n_estimators: usize,
    pub calibration_folds: usize,
    pub scoring_folds: usize,
    pub synthesis: SynthesisConfig,
    pub top_factors: usize,
    pub histogram_bins: usize,
    pub dependence_cap: usize,
    pub sample_cap: usize,
    pub pdp_steps: usize,
    pub test_fraction: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            n_estimators: 100,
            calibration_folds: 3,
            scoring_folds: 5,
            synthesis: SynthesisConfig::default(),
            top_factors: 3,
            histogram_bins: 10,
            dependence_cap: 50,
            sample_cap: 100,
            pdp_steps: 10,
            test_fraction: 0.2,
        }
    }
}

/// One contributing factor of a prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub feature: String,
    pub shap: f64,
}

/// Output of the predict path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub probability: f64,
    pub contributing_factors: Vec<ContributingFactor>,
}

/// The stateless per-request pipeline.
pub struct RiskPipeline {
    provider: Box<dyn DatasetProvider>,
    config: PipelineConfig,
}

impl RiskPipeline {
    pub fn new(provider: Box<dyn DatasetProvider>, config: PipelineConfig) -> Self {
        Self { provider, config }
    }

    fn forest_template(&self) -> RandomForest {
        RandomForest::new(self.config.n_estimators).with_random_state(self.config.seed)
    }

    /// Train, calibrate and predict the risk for one patient.
    pub fn predict(&self, patient: &PatientRecord) -> Result<Prediction> {
        let mut records = self.provider.load()?;
        augment_negatives(&mut records, &self.config.synthesis);
        let records = balance(records, self.config.seed);

        let encoder = FeatureEncoder::fit(&records)?;
        let x = encoder.encode_matrix(&records)?;
        let y = encoder.labels(&records);

        let model = CalibratedForest::fit(
            &self.forest_template(),
            &x,
            &y,
            self.config.calibration_folds,
        )?;

        let row = encoder.encode_record(patient)?;
        let probability = model.predict_proba_row(row.view())?;

        let explainer = TreeExplainer::new(model.forest())?;
        let phi = explainer.shap_values_row(row.view())?;
        let contributions = normalize_contributions(&phi.to_vec(), encoder.columns())?;

        let contributing_factors =
            top_factors(&contributions, &row, encoder.columns(), self.config.top_factors);

        Ok(Prediction { probability, contributing_factors })
    }

    /// Train and score a model, with dataset-level explanation summaries.
    pub fn data_science_metrics(&self) -> Result<MetricsReport> {
        let records = self.provider.load()?;
        let records = balance(records, self.config.seed);

        let encoder = FeatureEncoder::fit(&records)?;
        let x = encoder.encode_matrix(&records)?;
        let y = encoder.labels(&records);

        let template = self.forest_template();
        let scores = cross_validate(&template, &x, &y, self.config.scoring_folds)?;

        let (train_indices, _test_indices) =
            train_test_split(x.nrows(), self.config.test_fraction, self.config.seed)?;
        let x_train = x.select(Axis(0), &train_indices);
        let y_train = Array1::from_vec(train_indices.iter().map(|&i| y[i]).collect());

        let mut forest = template.clone();
        forest.fit(&x_train, &y_train)?;
        let y_proba = forest.predict_proba(&x)?;
        let prob_dist = probability_histogram(&y_proba, self.config.histogram_bins)?;

        let mut report = MetricsReport {
            metrics: scores.into(),
            prob_dist: prob_dist.into(),
            feature_importance: Vec::new(),
            shap_dependence: Vec::new(),
            partial_dependence: Vec::new(),
            y_proba: y_proba.to_vec(),
            first_patient_risk: y_proba.first().copied(),
            first_patient_shap: Vec::new(),
            first_patient_features: Vec::new(),
            shap_base_value: None,
            sample_shap_values: Vec::new(),
            sample_features: Vec::new(),
        };

        match self.attribution_summaries(&forest, &encoder, &x) {
            Ok(summaries) => summaries.fill(&mut report),
            Err(e) => {
                // the report stays useful without attribution
                warn!(error = %e, "attribution summaries failed, using impurity importances");
                if let Some(importance) = forest.feature_importances() {
                    report.feature_importance = rank_columns(importance, encoder.columns(), 5)
                        .into_iter()
                        .map(|(feature, importance)| FeatureImportance { feature, importance })
                        .collect();
                }
            }
        }

        Ok(report)
    }

    fn attribution_summaries(
        &self,
        forest: &RandomForest,
        encoder: &FeatureEncoder,
        x: &Array2<f64>,
    ) -> Result<AttributionSummaries> {
        let explainer = TreeExplainer::new(forest)?;
        let shap = explainer.shap_values(x)?;
        let columns = encoder.columns();

        let importance = mean_abs_by_column(&shap);
        let feature_importance = rank_columns(&importance, columns, 5)
            .into_iter()
            .map(|(feature, importance)| FeatureImportance { feature, importance })
            .collect();

        let shap_dependence = encoder
            .column_index(AGE_COLUMN)
            .map(|age_idx| {
                dependence_samples(x, &shap, age_idx, self.config.dependence_cap)
                    .into_iter()
                    .map(|(age, shap)| DependencePoint { age, shap })
                    .collect()
            })
            .unwrap_or_default();

        let partial = match encoder.column_index(PARTIAL_DEPENDENCE_COLUMN) {
            Some(idx) => partial_dependence(forest, x, idx, self.config.pdp_steps)?
                .into_iter()
                .map(|(calcium, pred)| PartialDependencePoint { calcium, pred })
                .collect(),
            None => Vec::new(),
        };

        let first_patient_shap = if shap.nrows() > 0 {
            normalize_contributions(&shap.row(0).to_vec(), columns)?
        } else {
            Vec::new()
        };

        let sampled = sample_rows(x.nrows(), self.config.sample_cap, self.config.seed);
        let sample_shap = shap.select(Axis(0), &sampled);
        let sample_shap_values = mean_abs_by_column(&sample_shap).to_vec();

        Ok(AttributionSummaries {
            feature_importance,
            shap_dependence,
            partial_dependence: partial,
            first_patient_shap,
            first_patient_features: columns.to_vec(),
            shap_base_value: explainer.expected_value(),
            sample_shap_values,
            sample_features: columns.to_vec(),
        })
    }
}

struct AttributionSummaries {
    feature_importance: Vec<FeatureImportance>,
    shap_dependence: Vec<DependencePoint>,
    partial_dependence: Vec<PartialDependencePoint>,
    first_patient_shap: Vec<f64>,
    first_patient_features: Vec<String>,
    shap_base_value: f64,
    sample_shap_values: Vec<f64>,
    sample_features: Vec<String>,
}

impl AttributionSummaries {
    fn fill(self, report: &mut MetricsReport) {
        report.feature_importance = self.feature_importance;
        report.shap_dependence = self.shap_dependence;
        report.partial_dependence = self.partial_dependence;
        report.first_patient_shap = self.first_patient_shap;
        report.first_patient_features = self.first_patient_features;
        report.shap_base_value = Some(self.shap_base_value);
        report.sample_shap_values = self.sample_shap_values;
        report.sample_features = self.sample_features;
    }
}

/// Rank contributions by magnitude and keep the active ones.
///
/// Takes the `k` largest by |contribution|, then drops indicator columns
/// whose encoded value is not 1 for this record; a factor that was not
/// present in the patient cannot be reported as contributing. May return
/// fewer than `k` entries.
pub fn top_factors(
    contributions: &[f64],
    row: &Array1<f64>,
    columns: &[String],
    k: usize,
) -> Vec<ContributingFactor> {
    let mut order: Vec<usize> = (0..contributions.len()).collect();
    order.sort_by(|&a, &b| {
        contributions[b]
            .abs()
            .partial_cmp(&contributions[a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    order
        .into_iter()
        .take(k)
        .filter(|&i| columns[i] == AGE_COLUMN || (row[i] - 1.0).abs() < f64::EPSILON)
        .map(|i| ContributingFactor {
            feature: columns[i].clone(),
            shap: contributions[i],
        })
        .collect()
}
