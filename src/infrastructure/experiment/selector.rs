//! Weighted random variant selection
//!
//! Lays the weights out on a cumulative axis of length `sum(weights)`, draws a
//! uniform integer on that axis and returns the key whose interval holds it.

use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::experiment::ConfigurationError;

/// Source of uniformly distributed integers
pub trait RandomSource: Send + Sync + Debug {
    /// Draw a uniform integer in `[0, upper)`; `upper` is always positive
    fn next_below(&self, upper: u64) -> u64;
}

/// Process-wide randomness backed by the thread-local generator
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandomSource;

impl RandomSource for ThreadRandomSource {
    fn next_below(&self, upper: u64) -> u64 {
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Reproducible randomness from a fixed seed
#[derive(Debug)]
pub struct SeededRandomSource {
    rng: Mutex<StdRng>,
}

impl SeededRandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn next_below(&self, upper: u64) -> u64 {
        // a panic elsewhere cannot leave the generator in an invalid state
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(0..upper)
    }
}

/// Pick one key with probability `weights[i] / sum(weights)`
pub fn select_weighted<'a, K: AsRef<str>>(
    keys: &'a [K],
    weights: &[u32],
    random: &dyn RandomSource,
) -> Result<&'a K, ConfigurationError> {
    if keys.len() != weights.len() {
        return Err(ConfigurationError::WeightCountMismatch {
            keys: keys.len(),
            weights: weights.len(),
        });
    }

    if keys.is_empty() {
        return Err(ConfigurationError::InsufficientVariants(0));
    }

    if let Some(index) = weights.iter().position(|w| *w == 0) {
        return Err(ConfigurationError::InvalidWeight {
            key: keys[index].as_ref().to_string(),
            weight: 0,
        });
    }

    let total: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    let draw = random.next_below(total).min(total - 1);

    let mut cumulative: u64 = 0;

    for (key, weight) in keys.iter().zip(weights) {
        cumulative += u64::from(*weight);

        if draw < cumulative {
            return Ok(key);
        }
    }

    // the final cumulative value equals total, so the loop always returns
    keys.last().ok_or(ConfigurationError::InsufficientVariants(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Returns the scripted draws in order, clamped below `upper`
    #[derive(Debug)]
    struct ScriptedSource {
        draws: Vec<u64>,
        next: AtomicU64,
    }

    impl ScriptedSource {
        fn new(draws: Vec<u64>) -> Self {
            Self {
                draws,
                next: AtomicU64::new(0),
            }
        }
    }

    impl RandomSource for ScriptedSource {
        fn next_below(&self, upper: u64) -> u64 {
            let index = self.next.fetch_add(1, Ordering::SeqCst) as usize;
            self.draws[index % self.draws.len()].min(upper - 1)
        }
    }

    #[test]
    fn test_draw_maps_to_cumulative_interval() {
        let keys = ["a", "b", "c"];
        let weights = [2, 3, 5];

        // axis: a = [0, 2), b = [2, 5), c = [5, 10)
        let cases = [(0, "a"), (1, "a"), (2, "b"), (4, "b"), (5, "c"), (9, "c")];

        for (draw, expected) in cases {
            let source = ScriptedSource::new(vec![draw]);
            let selected = select_weighted(&keys, &weights, &source).unwrap();
            assert_eq!(*selected, expected, "draw {} selected {}", draw, selected);
        }
    }

    #[test]
    fn test_skewed_distribution() {
        let keys = ["a", "b"];
        let weights = [1, 3];
        let source = SeededRandomSource::new(42);
        let trials = 100_000;

        let second = (0..trials)
            .filter(|_| *select_weighted(&keys, &weights, &source).unwrap() == "b")
            .count();

        let frequency = second as f64 / trials as f64;
        assert!(
            (frequency - 0.75).abs() < 0.01,
            "Expected ~0.75, got {}",
            frequency
        );
    }

    #[test]
    fn test_uniform_distribution() {
        let keys = ["a", "b", "c", "d"];
        let weights = [1, 1, 1, 1];
        let source = SeededRandomSource::new(7);
        let mut counts = [0u32; 4];

        for _ in 0..40_000 {
            let selected = select_weighted(&keys, &weights, &source).unwrap();
            let index = keys.iter().position(|k| k == selected).unwrap();
            counts[index] += 1;
        }

        for count in counts {
            assert!(
                (9_000..11_000).contains(&count),
                "Bucket count out of range: {}",
                count
            );
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let keys = ["a", "b", "c"];
        let weights = [1, 2, 3];
        let first = SeededRandomSource::new(99);
        let second = SeededRandomSource::new(99);

        for _ in 0..100 {
            assert_eq!(
                select_weighted(&keys, &weights, &first).unwrap(),
                select_weighted(&keys, &weights, &second).unwrap()
            );
        }
    }

    #[test]
    fn test_length_mismatch() {
        let result = select_weighted(&["a", "b"], &[1], &ThreadRandomSource);
        assert_eq!(
            result,
            Err(ConfigurationError::WeightCountMismatch { keys: 2, weights: 1 })
        );
    }

    #[test]
    fn test_zero_weight() {
        let result = select_weighted(&["a", "b"], &[1, 0], &ThreadRandomSource);
        assert_eq!(
            result,
            Err(ConfigurationError::InvalidWeight {
                key: "b".to_string(),
                weight: 0
            })
        );
    }

    #[test]
    fn test_empty_keys() {
        let keys: [&str; 0] = [];
        let result = select_weighted(&keys, &[], &ThreadRandomSource);
        assert_eq!(result, Err(ConfigurationError::InsufficientVariants(0)));
    }

    #[test]
    fn test_large_weights_do_not_overflow() {
        let keys = ["a", "b"];
        let weights = [u32::MAX, u32::MAX];
        let source = ScriptedSource::new(vec![u64::from(u32::MAX)]);

        assert_eq!(*select_weighted(&keys, &weights, &source).unwrap(), "b");
    }
}
