//! Patient dataset module
//!
//! Defines the fixed patient schema, the typed [`PatientRecord`] value
//! object, dataset providers, negative-case synthesis and class balancing.

mod balance;
mod provider;
mod synthesis;

pub use balance::balance;
pub use provider::{CsvDatasetProvider, DatasetProvider, SyntheticDatasetProvider};
pub use synthesis::{augment_negatives, SynthesisConfig};

use serde::{Deserialize, Serialize};

/// Name of the binary outcome column.
pub const LABEL_COLUMN: &str = "Osteoporosis";

/// Optional identifier column, dropped before encoding.
pub const ID_COLUMN: &str = "Id";

/// The single continuous attribute.
pub const AGE_COLUMN: &str = "Age";

/// A categorical attribute and its enumerated domain.
#[derive(Debug, Clone, Copy)]
pub struct CategoricalAttribute {
    pub name: &'static str,
    pub categories: &'static [&'static str],
}

/// The categorical attributes of the patient schema, in column order.
pub const CATEGORICAL_ATTRIBUTES: &[CategoricalAttribute] = &[
    CategoricalAttribute { name: "Gender", categories: &["Male", "Female"] },
    CategoricalAttribute { name: "Hormonal Changes", categories: &["Normal", "Postmenopausal"] },
    CategoricalAttribute { name: "Family History", categories: &["No", "Yes"] },
    CategoricalAttribute {
        name: "Race/Ethnicity",
        categories: &["White", "Asian", "Hispanic", "Black", "Other"],
    },
    CategoricalAttribute { name: "Body Weight", categories: &["Normal", "Underweight", "Overweight"] },
    CategoricalAttribute { name: "Calcium Intake", categories: &["Adequate", "Low"] },
    CategoricalAttribute { name: "Vitamin D Intake", categories: &["Sufficient", "Insufficient"] },
    CategoricalAttribute { name: "Physical Activity", categories: &["Active", "Sedentary"] },
    CategoricalAttribute { name: "Smoking", categories: &["No", "Yes"] },
    CategoricalAttribute { name: "Alcohol Consumption", categories: &["None", "Moderate", "Heavy"] },
    CategoricalAttribute {
        name: "Medical Conditions",
        categories: &["None", "Rheumatoid Arthritis", "Hyperthyroidism"],
    },
    CategoricalAttribute { name: "Medications", categories: &["None", "Corticosteroids"] },
    CategoricalAttribute { name: "Prior Fractures", categories: &["No", "Yes"] },
];

/// A single patient, without outcome label.
///
/// Deserialization accepts both the API field names (`Hormonal_Changes`)
/// and the CSV header names (`Hormonal Changes`). Unknown fields such as
/// `Id` are ignored, so identifiers are dropped on ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "Age")]
    pub age: i64,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Hormonal_Changes", alias = "Hormonal Changes")]
    pub hormonal_changes: String,
    #[serde(rename = "Family_History", alias = "Family History")]
    pub family_history: String,
    #[serde(rename = "Race_Ethnicity", alias = "Race/Ethnicity")]
    pub race_ethnicity: String,
    #[serde(rename = "Body_Weight", alias = "Body Weight")]
    pub body_weight: String,
    #[serde(rename = "Calcium_Intake", alias = "Calcium Intake")]
    pub calcium_intake: String,
    #[serde(rename = "Vitamin_D_Intake", alias = "Vitamin D Intake")]
    pub vitamin_d_intake: String,
    #[serde(rename = "Physical_Activity", alias = "Physical Activity")]
    pub physical_activity: String,
    #[serde(rename = "Smoking")]
    pub smoking: String,
    #[serde(rename = "Alcohol_Consumption", alias = "Alcohol Consumption")]
    pub alcohol_consumption: String,
    #[serde(rename = "Medical_Conditions", alias = "Medical Conditions")]
    pub medical_conditions: String,
    #[serde(rename = "Medications")]
    pub medications: String,
    #[serde(rename = "Prior_Fractures", alias = "Prior Fractures")]
    pub prior_fractures: String,
}

impl PatientRecord {
    /// Look up a categorical attribute by its schema (CSV header) name.
    pub fn categorical(&self, name: &str) -> Option<&str> {
        let value = match name {
            "Gender" => &self.gender,
            "Hormonal Changes" => &self.hormonal_changes,
            "Family History" => &self.family_history,
            "Race/Ethnicity" => &self.race_ethnicity,
            "Body Weight" => &self.body_weight,
            "Calcium Intake" => &self.calcium_intake,
            "Vitamin D Intake" => &self.vitamin_d_intake,
            "Physical Activity" => &self.physical_activity,
            "Smoking" => &self.smoking,
            "Alcohol Consumption" => &self.alcohol_consumption,
            "Medical Conditions" => &self.medical_conditions,
            "Medications" => &self.medications,
            "Prior Fractures" => &self.prior_fractures,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// A patient together with the binary outcome label (1 = osteoporosis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub patient: PatientRecord,
    pub label: i64,
}

/// Count records carrying the given label.
pub fn count_label(records: &[LabeledRecord], label: i64) -> usize {
    records.iter().filter(|r| r.label == label).count()
}

#[cfg(test)]
pub(crate) fn sample_patient() -> PatientRecord {
    PatientRecord {
        age: 65,
        gender: "Female".to_string(),
        hormonal_changes: "Postmenopausal".to_string(),
        family_history: "Yes".to_string(),
        race_ethnicity: "White".to_string(),
        body_weight: "Underweight".to_string(),
        calcium_intake: "Low".to_string(),
        vitamin_d_intake: "Insufficient".to_string(),
        physical_activity: "Sedentary".to_string(),
        smoking: "Yes".to_string(),
        alcohol_consumption: "Moderate".to_string(),
        medical_conditions: "None".to_string(),
        medications: "Corticosteroids".to_string(),
        prior_fractures: "No".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_api_field_names() {
        let json = serde_json::json!({
            "Age": 65,
            "Gender": "Female",
            "Hormonal_Changes": "Postmenopausal",
            "Family_History": "Yes",
            "Race_Ethnicity": "White",
            "Body_Weight": "Underweight",
            "Calcium_Intake": "Low",
            "Vitamin_D_Intake": "Insufficient",
            "Physical_Activity": "Sedentary",
            "Smoking": "Yes",
            "Alcohol_Consumption": "Moderate",
            "Medical_Conditions": "None",
            "Medications": "Corticosteroids",
            "Prior_Fractures": "No",
            "Id": 17,
        });
        let patient: PatientRecord = serde_json::from_value(json).unwrap();
        assert_eq!(patient.age, 65);
        assert_eq!(patient.categorical("Hormonal Changes"), Some("Postmenopausal"));
    }

    #[test]
    fn test_deserialize_csv_field_names() {
        let json = serde_json::json!({
            "Age": 30,
            "Gender": "Male",
            "Hormonal Changes": "Normal",
            "Family History": "No",
            "Race/Ethnicity": "Asian",
            "Body Weight": "Normal",
            "Calcium Intake": "Adequate",
            "Vitamin D Intake": "Sufficient",
            "Physical Activity": "Active",
            "Smoking": "No",
            "Alcohol Consumption": "None",
            "Medical Conditions": "None",
            "Medications": "None",
            "Prior Fractures": "No",
        });
        let patient: PatientRecord = serde_json::from_value(json).unwrap();
        assert_eq!(patient.categorical("Race/Ethnicity"), Some("Asian"));
    }

    #[test]
    fn test_deserialize_missing_field_fails() {
        let json = serde_json::json!({ "Age": 65, "Gender": "Female" });
        let result: std::result::Result<PatientRecord, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_count_label() {
        let records = vec![
            LabeledRecord { patient: sample_patient(), label: 1 },
            LabeledRecord { patient: sample_patient(), label: 0 },
            LabeledRecord { patient: sample_patient(), label: 1 },
        ];
        assert_eq!(count_label(&records, 1), 2);
        assert_eq!(count_label(&records, 0), 1);
    }
}
