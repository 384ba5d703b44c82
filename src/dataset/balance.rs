//! Class balancing by minority upsampling

use super::LabeledRecord;
use rand::prelude::*;

/// Balance outcome classes by upsampling the minority with replacement.
///
/// Splits by label, upsamples the smaller class to the larger class's size,
/// concatenates and shuffles under the seed. When one class is absent the
/// input is returned unchanged; single-class training is legal, though
/// metrics that need both classes will degenerate downstream.
pub fn balance(records: Vec<LabeledRecord>, seed: u64) -> Vec<LabeledRecord> {
    let (positives, negatives): (Vec<_>, Vec<_>) =
        records.into_iter().partition(|r| r.label == 1);

    let (majority, minority) = if positives.len() >= negatives.len() {
        (positives, negatives)
    } else {
        (negatives, positives)
    };

    if minority.is_empty() {
        return majority;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut balanced = majority;
    let target = balanced.len();
    for _ in 0..target {
        balanced.push(minority[rng.gen_range(0..minority.len())].clone());
    }
    balanced.shuffle(&mut rng);
    balanced
}
