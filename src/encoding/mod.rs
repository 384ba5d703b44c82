//! Feature encoding
//!
//! Turns typed patient records into a numeric design matrix: Age passes
//! through as-is, every categorical attribute is expanded into one-hot
//! indicator columns named `<attribute>_<category>`. The fitted column list
//! is the schema contract for the whole model and attribution stack.

use crate::dataset::{LabeledRecord, PatientRecord, AGE_COLUMN, CATEGORICAL_ATTRIBUTES};
use crate::error::{Result, RiskError};
use ndarray::{Array1, Array2};
use std::collections::BTreeSet;

/// One-hot encoder fitted on training data.
///
/// Column order is Age first, then indicator columns grouped by attribute
/// in schema order, categories sorted lexicographically within each
/// attribute. Only categories observed during `fit` get a column; unseen
/// categories at encode time map to an all-zero indicator group.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    columns: Vec<String>,
}

impl FeatureEncoder {
    /// Fit the encoder on training records, deriving the column list.
    pub fn fit(records: &[LabeledRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(RiskError::DataError(
                "cannot fit encoder on empty dataset".to_string(),
            ));
        }

        let mut columns = vec![AGE_COLUMN.to_string()];
        for attr in CATEGORICAL_ATTRIBUTES {
            let observed: BTreeSet<&str> = records
                .iter()
                .filter_map(|r| r.patient.categorical(attr.name))
                .collect();
            for category in observed {
                columns.push(format!("{}_{}", attr.name, category));
            }
        }

        Ok(Self { columns })
    }

    /// The fitted column names, in matrix order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Encode a batch of records into a design matrix.
    pub fn encode_matrix(&self, records: &[LabeledRecord]) -> Result<Array2<f64>> {
        let mut matrix = Array2::zeros((records.len(), self.columns.len()));
        for (i, record) in records.iter().enumerate() {
            let row = self.encode_record(&record.patient)?;
            matrix.row_mut(i).assign(&row);
        }
        Ok(matrix)
    }

    /// Encode a single patient, reindexed against the fitted columns.
    ///
    /// Columns absent from the patient's dummy expansion are zero-filled;
    /// categories the training data never produced are dropped. The result
    /// therefore always matches the training schema exactly.
    pub fn encode_record(&self, patient: &PatientRecord) -> Result<Array1<f64>> {
        let mut row = Array1::zeros(self.columns.len());
        for (j, column) in self.columns.iter().enumerate() {
            if column == AGE_COLUMN {
                row[j] = patient.age as f64;
                continue;
            }
            let (attr, category) = split_column(column).ok_or_else(|| {
                RiskError::SchemaMismatch {
                    input_columns: vec![column.clone()],
                    training_columns: self.columns.clone(),
                }
            })?;
            if patient.categorical(attr) == Some(category) {
                row[j] = 1.0;
            }
        }
        Ok(row)
    }

    /// Extract labels as a float vector aligned with `encode_matrix` rows.
    pub fn labels(&self, records: &[LabeledRecord]) -> Array1<f64> {
        records.iter().map(|r| r.label as f64).collect()
    }

    /// Index of a column by name, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Split a one-hot column name into its attribute and category parts.
///
/// Attribute names may themselves contain underscores only via category
/// values, so the split is resolved against the known schema rather than
/// at the first underscore.
fn split_column(column: &str) -> Option<(&str, &str)> {
    for attr in CATEGORICAL_ATTRIBUTES {
        if let Some(rest) = column.strip_prefix(attr.name) {
            if let Some(category) = rest.strip_prefix('_') {
                return Some((attr.name, category));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::sample_patient;

    fn training_records() -> Vec<LabeledRecord> {
        let mut a = sample_patient();
        a.gender = "Female".to_string();
        a.calcium_intake = "Low".to_string();
        let mut b = sample_patient();
        b.age = 30;
        b.gender = "Male".to_string();
        b.calcium_intake = "Adequate".to_string();
        vec![
            LabeledRecord { patient: a, label: 1 },
            LabeledRecord { patient: b, label: 0 },
        ]
    }

    #[test]
    fn test_fit_column_order() {
        let encoder = FeatureEncoder::fit(&training_records()).unwrap();
        let columns = encoder.columns();
        assert_eq!(columns[0], "Age");
        // categories sorted within the attribute
        let female = encoder.column_index("Gender_Female").unwrap();
        let male = encoder.column_index("Gender_Male").unwrap();
        assert!(female < male);
        assert!(encoder.column_index("Calcium Intake_Low").is_some());
    }

    #[test]
    fn test_fit_only_observed_categories() {
        let encoder = FeatureEncoder::fit(&training_records()).unwrap();
        // no record had Heavy alcohol consumption
        assert!(encoder.column_index("Alcohol Consumption_Heavy").is_none());
        assert!(encoder.column_index("Alcohol Consumption_Moderate").is_some());
    }

    #[test]
    fn test_encode_record_indicators() {
        let encoder = FeatureEncoder::fit(&training_records()).unwrap();
        let patient = sample_patient();
        let row = encoder.encode_record(&patient).unwrap();

        assert_eq!(row[encoder.column_index("Age").unwrap()], 65.0);
        assert_eq!(row[encoder.column_index("Gender_Female").unwrap()], 1.0);
        assert_eq!(row[encoder.column_index("Gender_Male").unwrap()], 0.0);
        assert_eq!(row[encoder.column_index("Calcium Intake_Low").unwrap()], 1.0);
    }

    #[test]
    fn test_encode_unseen_category_zero_fills() {
        let encoder = FeatureEncoder::fit(&training_records()).unwrap();
        let mut patient = sample_patient();
        patient.alcohol_consumption = "Heavy".to_string();
        let row = encoder.encode_record(&patient).unwrap();
        // entire Alcohol Consumption group is zero
        assert_eq!(row[encoder.column_index("Alcohol Consumption_Moderate").unwrap()], 0.0);
    }

    #[test]
    fn test_encode_matrix_shape_and_labels() {
        let records = training_records();
        let encoder = FeatureEncoder::fit(&records).unwrap();
        let matrix = encoder.encode_matrix(&records).unwrap();
        assert_eq!(matrix.nrows(), 2);
        assert_eq!(matrix.ncols(), encoder.columns().len());
        let labels = encoder.labels(&records);
        assert_eq!(labels.to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_fit_empty_fails() {
        assert!(FeatureEncoder::fit(&[]).is_err());
    }

    #[test]
    fn test_split_column_with_underscore_category() {
        let (attr, cat) = split_column("Medical Conditions_Rheumatoid Arthritis").unwrap();
        assert_eq!(attr, "Medical Conditions");
        assert_eq!(cat, "Rheumatoid Arthritis");
    }
}
