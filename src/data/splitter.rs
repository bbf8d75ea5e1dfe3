// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Splits the training samples into two subsets:
//   - Training subset:   used to update model weights
//   - Validation subset: used to watch generalisation each epoch
//
// The validation subset is the TAIL of the input: with a 0.2
// validation fraction the last 20% of the samples are held out.
// This is how Keras' `validation_split` behaves, and it keeps
// runs comparable without any randomness.
//
// An optional seed shuffles the samples first (Fisher-Yates via
// rand::seq::SliceRandom with a seeded StdRng) for datasets that
// arrive sorted by class.
//
// Split ratio: 80% training, 20% validation (configurable)
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Split `samples` into (train, validation).
///
/// # Arguments
/// * `samples`             - All available samples (consumed by this function)
/// * `validation_fraction` - Proportion held out, e.g. 0.2 = 20%
/// * `shuffle_seed`        - Shuffle with this seed before splitting
///
/// # Returns
/// A tuple (train_samples, val_samples)
pub fn split_train_val<T>(
    mut samples:         Vec<T>,
    validation_fraction: f64,
    shuffle_seed:        Option<u64>,
) -> (Vec<T>, Vec<T>) {
    if let Some(seed) = shuffle_seed {
        let mut rng = StdRng::seed_from_u64(seed);
        samples.shuffle(&mut rng);
    }

    // e.g. 60000 samples * 0.2 = 12000 held out → split at 48000
    let total    = samples.len();
    let held_out = ((total as f64) * validation_fraction.clamp(0.0, 1.0)).round() as usize;
    let split_at = total - held_out.min(total);

    // split_off(n) removes elements [n..] from the Vec and returns them
    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len()     * 100) / total.max(1),
    );

    (samples, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_val(items, 0.2, None);
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(),   20);
    }

    #[test]
    fn test_validation_is_tail_without_seed() {
        let items: Vec<usize> = (0..10).collect();
        let (train, val)      = split_train_val(items, 0.2, None);
        assert_eq!(train, (0..8).collect::<Vec<_>>());
        assert_eq!(val,   vec![8, 9]);
    }

    #[test]
    fn test_subsets_are_disjoint_and_complete() {
        let items: Vec<usize> = (0..50).collect();
        let (train, val)      = split_train_val(items, 0.3, Some(7));
        assert_eq!(train.len() + val.len(), 50);
        assert!(train.iter().all(|t| !val.contains(t)));
    }

    #[test]
    fn test_same_seed_same_split() {
        let (a, _) = split_train_val((0..40).collect::<Vec<usize>>(), 0.25, Some(3));
        let (b, _) = split_train_val((0..40).collect::<Vec<usize>>(), 0.25, Some(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val)      = split_train_val(items, 0.2, None);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_zero_fraction_keeps_everything() {
        let items: Vec<usize> = (0..10).collect();
        let (train, val)      = split_train_val(items, 0.0, None);
        assert_eq!(train.len(), 10);
        assert!(val.is_empty());
    }
}
