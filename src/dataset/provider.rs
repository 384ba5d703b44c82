//! Dataset providers
//!
//! Two interchangeable sources behind one trait: a CSV-backed provider for
//! the real dataset and a synthetic provider that generates patients from a
//! parametric risk model. The whole downstream pipeline is shared.

use crate::error::{Result, RiskError};
use super::{LabeledRecord, PatientRecord, AGE_COLUMN, CATEGORICAL_ATTRIBUTES, LABEL_COLUMN};
use polars::prelude::*;
use rand::prelude::*;
use rand_distr::Normal;
use std::io::Cursor;
use std::path::PathBuf;

/// Source of labeled patient records.
pub trait DatasetProvider: Send + Sync {
    fn load(&self) -> Result<Vec<LabeledRecord>>;
}

/// Loads patient records from a header-row CSV file.
#[derive(Debug, Clone)]
pub struct CsvDatasetProvider {
    path: PathBuf,
}

impl CsvDatasetProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DatasetProvider for CsvDatasetProvider {
    fn load(&self) -> Result<Vec<LabeledRecord>> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            RiskError::DataUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let df = CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .into_reader_with_file_handle(Cursor::new(&bytes))
            .finish()?;

        if df.height() == 0 {
            return Err(RiskError::DataUnavailable(format!(
                "{} contains no records",
                self.path.display()
            )));
        }

        records_from_dataframe(&df)
    }
}

fn records_from_dataframe(df: &DataFrame) -> Result<Vec<LabeledRecord>> {
    let height = df.height();

    let ages = df
        .column(AGE_COLUMN)?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let ages = ages.i64()?.clone();

    let labels = df
        .column(LABEL_COLUMN)?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let labels = labels.i64()?.clone();

    let mut categorical_columns = Vec::with_capacity(CATEGORICAL_ATTRIBUTES.len());
    for attr in CATEGORICAL_ATTRIBUTES {
        let series = df.column(attr.name)?.as_materialized_series().clone();
        let values = series.str()?.clone();
        categorical_columns.push(values);
    }

    let cell = |col: &StringChunked, name: &str, i: usize| -> Result<String> {
        col.get(i)
            .map(|s| s.to_string())
            .ok_or_else(|| RiskError::DataError(format!("null value in column {} at row {}", name, i)))
    };

    let mut records = Vec::with_capacity(height);
    for i in 0..height {
        let age = ages
            .get(i)
            .ok_or_else(|| RiskError::DataError(format!("null Age at row {}", i)))?;
        let label = labels
            .get(i)
            .ok_or_else(|| RiskError::DataError(format!("null {} at row {}", LABEL_COLUMN, i)))?;

        let patient = PatientRecord {
            age,
            gender: cell(&categorical_columns[0], "Gender", i)?,
            hormonal_changes: cell(&categorical_columns[1], "Hormonal Changes", i)?,
            family_history: cell(&categorical_columns[2], "Family History", i)?,
            race_ethnicity: cell(&categorical_columns[3], "Race/Ethnicity", i)?,
            body_weight: cell(&categorical_columns[4], "Body Weight", i)?,
            calcium_intake: cell(&categorical_columns[5], "Calcium Intake", i)?,
            vitamin_d_intake: cell(&categorical_columns[6], "Vitamin D Intake", i)?,
            physical_activity: cell(&categorical_columns[7], "Physical Activity", i)?,
            smoking: cell(&categorical_columns[8], "Smoking", i)?,
            alcohol_consumption: cell(&categorical_columns[9], "Alcohol Consumption", i)?,
            medical_conditions: cell(&categorical_columns[10], "Medical Conditions", i)?,
            medications: cell(&categorical_columns[11], "Medications", i)?,
            prior_fractures: cell(&categorical_columns[12], "Prior Fractures", i)?,
        };

        records.push(LabeledRecord { patient, label });
    }

    Ok(records)
}

/// Generates patients from a parametric risk model.
///
/// Age is drawn from Normal(60, 15) clipped to [18, 90]; the categorical
/// attributes are drawn with fixed weights; the outcome label is an additive
/// risk score plus Normal(0, 0.1) noise thresholded at 0.5.
#[derive(Debug, Clone)]
pub struct SyntheticDatasetProvider {
    n_samples: usize,
    seed: u64,
}

impl SyntheticDatasetProvider {
    pub fn new(n_samples: usize) -> Self {
        Self { n_samples, seed: 42 }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl DatasetProvider for SyntheticDatasetProvider {
    fn load(&self) -> Result<Vec<LabeledRecord>> {
        if self.n_samples == 0 {
            return Err(RiskError::DataUnavailable(
                "synthetic dataset size is zero".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let age_dist = Normal::<f64>::new(60.0, 15.0)
            .map_err(|e| RiskError::ValidationError(e.to_string()))?;
        let noise_dist = Normal::new(0.0, 0.1)
            .map_err(|e| RiskError::ValidationError(e.to_string()))?;

        let mut records = Vec::with_capacity(self.n_samples);
        for _ in 0..self.n_samples {
            let age = (rng.sample(age_dist).round() as i64).clamp(18, 90);

            let patient = PatientRecord {
                age,
                gender: pick(&mut rng, &["Male", "Female"]),
                hormonal_changes: pick(&mut rng, &["Normal", "Postmenopausal"]),
                family_history: pick_binary(&mut rng, "Yes", "No", 0.3),
                race_ethnicity: pick(&mut rng, &["White", "Asian", "Hispanic", "Black", "Other"]),
                body_weight: pick(&mut rng, &["Normal", "Underweight", "Overweight"]),
                calcium_intake: pick(&mut rng, &["Adequate", "Low"]),
                vitamin_d_intake: pick(&mut rng, &["Sufficient", "Insufficient"]),
                physical_activity: pick(&mut rng, &["Active", "Sedentary"]),
                smoking: pick_binary(&mut rng, "Yes", "No", 0.2),
                alcohol_consumption: pick(&mut rng, &["None", "Moderate", "Heavy"]),
                medical_conditions: pick(&mut rng, &["None", "Rheumatoid Arthritis", "Hyperthyroidism"]),
                medications: pick_binary(&mut rng, "Corticosteroids", "None", 0.2),
                prior_fractures: pick_binary(&mut rng, "Yes", "No", 0.3),
            };

            let score = risk_score(&patient) + rng.sample(noise_dist);
            let label = i64::from(score > 0.5);
            records.push(LabeledRecord { patient, label });
        }

        Ok(records)
    }
}

fn pick<R: Rng>(rng: &mut R, options: &[&str]) -> String {
    options[rng.gen_range(0..options.len())].to_string()
}

fn pick_binary<R: Rng>(rng: &mut R, hit: &str, miss: &str, p_hit: f64) -> String {
    if rng.gen_bool(p_hit) { hit.to_string() } else { miss.to_string() }
}

/// Additive risk score over the known osteoporosis risk factors.
fn risk_score(p: &PatientRecord) -> f64 {
    let mut score = 0.0;
    if p.age > 65 {
        score += 0.3;
    }
    if p.gender == "Female" {
        score += 0.2;
    }
    if p.hormonal_changes == "Postmenopausal" {
        score += 0.2;
    }
    if p.family_history == "Yes" {
        score += 0.15;
    }
    if p.body_weight == "Underweight" {
        score += 0.1;
    }
    if p.calcium_intake == "Low" {
        score += 0.1;
    }
    if p.vitamin_d_intake == "Insufficient" {
        score += 0.1;
    }
    if p.physical_activity == "Sedentary" {
        score += 0.1;
    }
    if p.smoking == "Yes" {
        score += 0.1;
    }
    if p.alcohol_consumption == "Heavy" {
        score += 0.1;
    }
    if p.medical_conditions != "None" {
        score += 0.15;
    }
    if p.medications == "Corticosteroids" {
        score += 0.2;
    }
    if p.prior_fractures == "Yes" {
        score += 0.2;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::count_label;

    #[test]
    fn test_synthetic_provider_deterministic() {
        let provider = SyntheticDatasetProvider::new(200).with_seed(42);
        let a = provider.load().unwrap();
        let b = provider.load().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 200);
    }

    #[test]
    fn test_synthetic_provider_has_both_classes() {
        let records = SyntheticDatasetProvider::new(500).load().unwrap();
        assert!(count_label(&records, 0) > 0);
        assert!(count_label(&records, 1) > 0);
    }

    #[test]
    fn test_synthetic_ages_in_range() {
        let records = SyntheticDatasetProvider::new(300).load().unwrap();
        assert!(records.iter().all(|r| (18..=90).contains(&r.patient.age)));
    }

    #[test]
    fn test_csv_provider_missing_file() {
        let provider = CsvDatasetProvider::new("/nonexistent/osteoporosis.csv");
        let err = provider.load().unwrap_err();
        assert!(matches!(err, RiskError::DataUnavailable(_)));
    }

    #[test]
    fn test_csv_provider_round_trip() {
        let dir = std::env::temp_dir().join("bonehealth-test-csv");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("osteoporosis.csv");
        let csv = "\
Id,Age,Gender,Hormonal Changes,Family History,Race/Ethnicity,Body Weight,Calcium Intake,Vitamin D Intake,Physical Activity,Smoking,Alcohol Consumption,Medical Conditions,Medications,Prior Fractures,Osteoporosis
1,70,Female,Postmenopausal,Yes,White,Underweight,Low,Insufficient,Sedentary,Yes,Heavy,Hyperthyroidism,Corticosteroids,Yes,1
2,25,Male,Normal,No,Asian,Normal,Adequate,Sufficient,Active,No,None,None,None,No,0
";
        std::fs::write(&path, csv).unwrap();

        let records = CsvDatasetProvider::new(&path).load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, 1);
        assert_eq!(records[0].patient.age, 70);
        assert_eq!(records[1].patient.categorical("Calcium Intake"), Some("Adequate"));
    }

    #[test]
    fn test_risk_score_monotone_in_risk_factors() {
        let mut low = crate::dataset::sample_patient();
        low.age = 30;
        low.gender = "Male".to_string();
        low.hormonal_changes = "Normal".to_string();
        low.family_history = "No".to_string();
        low.body_weight = "Normal".to_string();
        low.calcium_intake = "Adequate".to_string();
        low.vitamin_d_intake = "Sufficient".to_string();
        low.physical_activity = "Active".to_string();
        low.smoking = "No".to_string();
        low.alcohol_consumption = "None".to_string();
        low.medications = "None".to_string();
        low.prior_fractures = "No".to_string();

        let mut high = low.clone();
        high.age = 80;
        high.gender = "Female".to_string();
        high.hormonal_changes = "Postmenopausal".to_string();
        high.prior_fractures = "Yes".to_string();

        assert!(risk_score(&high) > risk_score(&low));
    }
}
