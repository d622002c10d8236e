use rand::{Rng, SeedableRng, rngs::StdRng};
use std::sync::{Arc, Mutex, PoisonError};

/// Source of randomness for every stochastic decision of a run.
///
/// Implemented for [`StdRng`]; tests substitute scripted sources to pin
/// down individual draws. Sampling and shuffling are written out over
/// [`RandomSource::integer`] instead of `rand::seq::SliceRandom` so that
/// those draws go through this trait too.
pub trait RandomSource: Send {
    /// Uniform integer in `[low, high]`, both inclusive.
    fn integer(&mut self, low: usize, high: usize) -> usize;

    /// Uniform float in `[0.0, 1.0)`.
    fn float(&mut self) -> f64;
}

impl RandomSource for StdRng {
    fn integer(&mut self, low: usize, high: usize) -> usize {
        if low >= high {
            return low;
        }
        self.random_range(low..=high)
    }

    fn float(&mut self) -> f64 {
        self.random::<f64>()
    }
}

/// Creates the run generator, seeded when the job carries a seed.
pub fn seeded(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// A random source shared between the orchestrator and the candidates it prepares.
#[derive(Clone)]
pub struct Randomness(Arc<Mutex<Box<dyn RandomSource>>>);

impl Randomness {
    pub fn new(source: impl RandomSource + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(source))))
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut dyn RandomSource) -> T) -> T {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **guard)
    }
}

/// Draws `count` distinct indices out of `0..n` (partial Fisher-Yates).
pub(crate) fn sample_indices<R: RandomSource + ?Sized>(
    rng: &mut R,
    n: usize,
    count: usize,
) -> Vec<usize> {
    let count = count.min(n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..count {
        let j = rng.integer(i, n - 1);
        indices.swap(i, j);
    }
    indices.truncate(count);
    indices
}

/// Boolean vector of length `n` with exactly `number_of_true` random positions set.
pub(crate) fn random_bool_array<R: RandomSource + ?Sized>(
    rng: &mut R,
    n: usize,
    number_of_true: usize,
) -> Vec<bool> {
    let mut genes = vec![false; n];
    for index in sample_indices(rng, n, number_of_true) {
        genes[index] = true;
    }
    genes
}

/// Index drawn from a discrete distribution given a uniform draw `r` in `[0, 1)`.
///
/// Falls back to the last index when rounding leaves `r * total` past the end.
pub(crate) fn pick_weighted(weights: &[f64], r: f64, total: f64) -> usize {
    let target = r * total;
    let mut cumulative = 0.0;
    for (index, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if target < cumulative {
            return index;
        }
    }
    weights.len().saturating_sub(1)
}

/// In-place shuffle of a slice.
pub(crate) fn shuffle<T, R: RandomSource + ?Sized>(rng: &mut R, values: &mut [T]) {
    let n = values.len();
    for i in 0..n.saturating_sub(1) {
        let j = rng.integer(i, n - 1);
        values.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_draws_integers_within_inclusive_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let value = rng.integer(3, 5);
            assert!((3..=5).contains(&value));
        }
        assert_eq!(rng.integer(4, 4), 4);
    }

    #[test]
    fn it_samples_distinct_indices() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut sample = sample_indices(&mut rng, 10, 6);
        assert_eq!(sample.len(), 6);
        sample.sort();
        sample.dedup();
        assert_eq!(sample.len(), 6);
        assert!(sample.iter().all(|&index| index < 10));
    }

    #[test]
    fn it_builds_bool_arrays_with_exact_true_count() {
        let mut rng = StdRng::seed_from_u64(1);
        for count in 0..=8 {
            let genes = random_bool_array(&mut rng, 8, count);
            assert_eq!(genes.len(), 8);
            assert_eq!(genes.iter().filter(|&&gene| gene).count(), count);
        }
    }

    #[test]
    fn it_caps_sample_size_at_population() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(sample_indices(&mut rng, 3, 10).len(), 3);
        assert!(sample_indices(&mut rng, 0, 2).is_empty());
    }

    #[test]
    fn it_shuffles_into_a_permutation() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut values: Vec<usize> = (0..20).collect();
        shuffle(&mut rng, &mut values);
        let mut sorted = values.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn it_picks_weighted_indices() {
        let weights = [1.0, 2.0, 1.0];
        assert_eq!(pick_weighted(&weights, 0.0, 4.0), 0);
        assert_eq!(pick_weighted(&weights, 0.3, 4.0), 1);
        assert_eq!(pick_weighted(&weights, 0.74, 4.0), 1);
        assert_eq!(pick_weighted(&weights, 0.75, 4.0), 2);
        assert_eq!(pick_weighted(&weights, 1.0, 4.0), 2);
    }

    #[test]
    fn it_shares_a_source_between_clones() {
        let randomness = Randomness::new(StdRng::seed_from_u64(5));
        let clone = randomness.clone();
        let first = randomness.with(|rng| rng.integer(0, 1_000_000));
        let second = clone.with(|rng| rng.integer(0, 1_000_000));

        let mut reference = StdRng::seed_from_u64(5);
        assert_eq!(first, reference.integer(0, 1_000_000));
        assert_eq!(second, reference.integer(0, 1_000_000));
    }
}
