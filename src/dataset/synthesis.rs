//! Negative-case synthesis
//!
//! Demo datasets are dominated by positive outcomes. When negatives are too
//! sparse to train on, plausible negative cases are synthesized by resampling
//! positive records and overwriting their risk attributes along a three-tier
//! severity distribution (60% low risk, 30% moderate, 10% borderline).

use super::{count_label, LabeledRecord};
use rand::prelude::*;

/// Configuration for negative-case synthesis.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Synthesize only when the dataset holds fewer negatives than this.
    pub min_negatives: usize,
    /// Upper bound on the number of positives resampled as templates.
    pub pool_cap: usize,
    pub seed: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self { min_negatives: 10, pool_cap: 500, seed: 42 }
    }
}

/// Append synthesized negative records when negatives are too sparse.
///
/// Resamples `min(pool_cap, len)` positive records with replacement and
/// rewrites each into a negative profile. Deterministic under the seed.
/// A dataset without positive records is left unchanged.
pub fn augment_negatives(records: &mut Vec<LabeledRecord>, config: &SynthesisConfig) {
    if count_label(records, 0) >= config.min_negatives {
        return;
    }

    let positives: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.label == 1)
        .map(|(i, _)| i)
        .collect();
    if positives.is_empty() {
        return;
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let n = config.pool_cap.min(records.len());

    let mut synthesized = Vec::with_capacity(n);
    for _ in 0..n {
        let template = positives[rng.gen_range(0..positives.len())];
        let mut record = records[template].clone();
        let tier = rng.gen::<f64>();
        if tier < 0.6 {
            rewrite_low_risk(&mut record, &mut rng);
        } else if tier < 0.9 {
            rewrite_sampled_risk(&mut record, &mut rng, 41, 60);
        } else {
            rewrite_sampled_risk(&mut record, &mut rng, 61, 75);
        }
        record.label = 0;
        synthesized.push(record);
    }

    records.extend(synthesized);
}

/// Young patient with every risk attribute set to its healthy value.
fn rewrite_low_risk<R: Rng>(record: &mut LabeledRecord, rng: &mut R) {
    let p = &mut record.patient;
    p.age = rng.gen_range(18..=40);
    p.gender = "Male".to_string();
    p.hormonal_changes = "Normal".to_string();
    p.family_history = "No".to_string();
    p.body_weight = "Normal".to_string();
    p.calcium_intake = "Adequate".to_string();
    p.vitamin_d_intake = "Sufficient".to_string();
    p.physical_activity = "Active".to_string();
    p.smoking = "No".to_string();
    p.alcohol_consumption = "None".to_string();
    p.medical_conditions = "None".to_string();
    p.medications = "None".to_string();
    p.prior_fractures = "No".to_string();
}

/// Moderate or borderline profile: each attribute drawn independently from
/// a small risk-relevant set, age drawn from the tier's range.
fn rewrite_sampled_risk<R: Rng>(record: &mut LabeledRecord, rng: &mut R, age_min: i64, age_max: i64) {
    let pick = |rng: &mut R, options: &[&str]| options[rng.gen_range(0..options.len())].to_string();

    let p = &mut record.patient;
    p.age = rng.gen_range(age_min..=age_max);
    p.gender = pick(rng, &["Male", "Female"]);
    p.hormonal_changes = pick(rng, &["Normal", "Postmenopausal"]);
    p.family_history = pick(rng, &["No", "Yes"]);
    p.body_weight = pick(rng, &["Normal", "Underweight"]);
    p.calcium_intake = pick(rng, &["Adequate", "Low"]);
    p.vitamin_d_intake = pick(rng, &["Sufficient", "Insufficient"]);
    p.physical_activity = pick(rng, &["Active", "Sedentary"]);
    p.smoking = pick(rng, &["No", "Yes"]);
    p.alcohol_consumption = pick(rng, &["None", "Moderate"]);
    p.medical_conditions = pick(rng, &["None", "Rheumatoid Arthritis", "Hyperthyroidism"]);
    p.medications = pick(rng, &["None", "Corticosteroids"]);
    p.prior_fractures = pick(rng, &["No", "Yes"]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::sample_patient;

    fn dataset(positives: usize, negatives: usize) -> Vec<LabeledRecord> {
        let mut records = Vec::new();
        for _ in 0..positives {
            records.push(LabeledRecord { patient: sample_patient(), label: 1 });
        }
        for _ in 0..negatives {
            records.push(LabeledRecord { patient: sample_patient(), label: 0 });
        }
        records
    }

    #[test]
    fn test_sparse_negatives_trigger_synthesis() {
        let mut records = dataset(100, 2);
        augment_negatives(&mut records, &SynthesisConfig::default());
        assert!(count_label(&records, 0) >= 10);
        // all synthesized records are negatives appended after the originals
        assert_eq!(count_label(&records, 1), 100);
    }

    #[test]
    fn test_enough_negatives_skips_synthesis() {
        let mut records = dataset(50, 20);
        augment_negatives(&mut records, &SynthesisConfig::default());
        assert_eq!(records.len(), 70);
    }

    #[test]
    fn test_no_positives_skips_synthesis() {
        let mut records = dataset(0, 2);
        augment_negatives(&mut records, &SynthesisConfig::default());
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_deterministic_under_seed() {
        let mut a = dataset(40, 0);
        let mut b = dataset(40, 0);
        let config = SynthesisConfig::default();
        augment_negatives(&mut a, &config);
        augment_negatives(&mut b, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_synthesized_ages_follow_tiers() {
        let mut records = dataset(200, 0);
        augment_negatives(&mut records, &SynthesisConfig::default());
        for record in records.iter().filter(|r| r.label == 0) {
            assert!((18..=75).contains(&record.patient.age));
        }
    }
}
