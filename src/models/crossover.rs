use crate::models::random::RandomSource;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Builds a child from segments alternating between two parents.
///
/// `cuts` must be sorted ascending and within `0..=a.len()`. The child takes
/// `a[0..cuts[0])`, then `b[cuts[0]..cuts[1])`, and so on; the end of the
/// genome closes the last segment.
#[instrument(level = "debug", skip(a, b), fields(genome_length = a.len()))]
pub(crate) fn crossover_at(a: &[bool], b: &[bool], cuts: &[usize]) -> Vec<bool> {
    let n = a.len();
    let mut child = Vec::with_capacity(n);
    let mut start = 0;

    for (segment, &end) in cuts.iter().chain(std::iter::once(&n)).enumerate() {
        let end = end.clamp(start, n);
        let parent = if segment % 2 == 0 { a } else { b };
        child.extend_from_slice(&parent[start..end]);
        start = end;
    }

    child
}

/// K-point crossover with cut points kept clear of the protected prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KPointCrossover {
    cuts: usize,
}

impl KPointCrossover {
    pub fn new(cuts: usize) -> Self {
        Self { cuts }
    }

    #[instrument(level = "debug", skip(self, rng, a, b), fields(cuts = self.cuts, protected = protected))]
    pub fn crossover<R: RandomSource + ?Sized>(
        &self,
        rng: &mut R,
        a: &[bool],
        b: &[bool],
        protected: usize,
    ) -> Vec<bool> {
        let n = a.len();
        if protected >= n {
            return a.to_vec();
        }

        let mut cuts: Vec<usize> = (0..self.cuts)
            .map(|_| rng.integer(protected, n - 1))
            .collect();
        cuts.sort_unstable();

        crossover_at(a, b, &cuts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn it_splits_at_a_single_cut() {
        let a = [true, true, true, true, true, true];
        let b = [false, false, false, false, false, false];
        assert_eq!(
            crossover_at(&a, &b, &[2]),
            vec![true, true, false, false, false, false]
        );
    }

    #[test]
    fn it_alternates_between_parents_for_several_cuts() {
        let a = [true; 6];
        let b = [false; 6];
        assert_eq!(
            crossover_at(&a, &b, &[1, 3, 5]),
            vec![true, false, false, true, true, false]
        );
    }

    #[test]
    fn it_tolerates_repeated_cuts() {
        let a = [true; 4];
        let b = [false; 4];
        assert_eq!(crossover_at(&a, &b, &[2, 2]), vec![true; 4]);
    }

    #[test]
    fn it_keeps_the_protected_prefix_from_parent_a() {
        let a = [true, true, false, true, false, true, false];
        let b = [true, true, true, false, true, false, true];
        let crossover = KPointCrossover::new(2);
        let mut rng = StdRng::seed_from_u64(21);

        for _ in 0..100 {
            let child = crossover.crossover(&mut rng, &a, &b, 2);
            assert_eq!(child.len(), a.len());
            assert!(child[0] && child[1]);
            for (index, gene) in child.iter().enumerate() {
                assert!(*gene == a[index] || *gene == b[index]);
            }
        }
    }
}
