// ============================================================
// Layer 4 - Train/Validation Splitter
// ============================================================
// Used when no separate validation archive is given: shuffle
// the training examples and hold out a fraction of them.
//
// The shuffle is seeded, so the same seed always holds out
// the same examples, across resumed runs too.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// `train_fraction` is clamped to [0, 1].
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    let split_at = split_at.min(total);

    // After this: samples = [0..split_at], val = [split_at..total]
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

/// Keep the first `subset` items; 0 keeps everything.
pub fn take_subset<T>(mut samples: Vec<T>, subset: usize) -> Vec<T> {
    if subset > 0 && subset < samples.len() {
        tracing::info!("Training on a subset of {} of {} examples", subset, samples.len());
        samples.truncate(subset);
    }
    samples
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_val(items, 0.9, 7);
        assert_eq!(train.len(), 90);
        assert_eq!(val.len(),   10);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, val)      = split_train_val(items, 0.7, 7);
        let mut all: Vec<usize> = train.into_iter().chain(val).collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_train_val((0..40).collect::<Vec<usize>>(), 0.75, 11);
        let b = split_train_val((0..40).collect::<Vec<usize>>(), 0.75, 11);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val)      = split_train_val(items, 0.8, 0);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_subset_keeps_leading_items() {
        assert_eq!(take_subset(vec![1, 2, 3, 4], 2), vec![1, 2]);
        assert_eq!(take_subset(vec![1, 2, 3], 0), vec![1, 2, 3]);
        assert_eq!(take_subset(vec![1, 2], 5), vec![1, 2]);
    }
}
