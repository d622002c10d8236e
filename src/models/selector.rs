//! Parent selection.
//!
//! Parents are drawn from a generation that is already sorted best-first,
//! so a lower index always means a better candidate. A tournament draws a
//! slate of distinct indices, sorts it, and walks it with geometric decay:
//! the best of the slate wins with probability `p`, the second with
//! `p * (1 - p)`, and so on, wrapping around the slate until someone wins.
//!
//! ```rust
//! use durable_network_ga::models::Tournament;
//! use rand::{SeedableRng, rngs::StdRng};
//!
//! let tournament = Tournament::new(3, 0.7);
//! let mut rng = StdRng::seed_from_u64(1);
//! let index = tournament.select_index(&mut rng, 10, &[0]).unwrap();
//! assert!(index > 0 && index < 10);
//! ```

use crate::models::random::{RandomSource, sample_indices};
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum SelectionError {
    #[error("No valid parents available for selection")]
    NoValidParents,
}

/// Tournament selection over a best-first ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct Tournament {
    size: usize,
    probability: f64,
}

impl Tournament {
    pub fn new(size: usize, probability: f64) -> Self {
        Self { size, probability }
    }

    /// Picks one index in `0..population_len`, never one of `excluded`.
    #[instrument(level = "debug", skip(self, rng, excluded), fields(tournament_size = self.size, population_len = population_len, excluded = excluded.len()))]
    pub fn select_index<R: RandomSource + ?Sized>(
        &self,
        rng: &mut R,
        population_len: usize,
        excluded: &[usize],
    ) -> Result<usize, SelectionError> {
        let pool: Vec<usize> = (0..population_len)
            .filter(|index| !excluded.contains(index))
            .collect();

        if pool.is_empty() {
            return Err(SelectionError::NoValidParents);
        }

        let mut slate: Vec<usize> = sample_indices(rng, pool.len(), self.size.max(1))
            .into_iter()
            .map(|position| pool[position])
            .collect();
        slate.sort_unstable();

        // Geometric decay never terminates without any probability mass.
        if self.probability <= 0.0 {
            return Ok(slate[rng.integer(0, slate.len() - 1)]);
        }

        let mut attempt = 0;
        loop {
            if rng.float() < self.probability {
                return Ok(slate[attempt % slate.len()]);
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    /// Returns `low` for every integer draw and a fixed float.
    struct Fixed(f64);

    impl RandomSource for Fixed {
        fn integer(&mut self, low: usize, _high: usize) -> usize {
            low
        }

        fn float(&mut self) -> f64 {
            self.0
        }
    }

    /// Fails `misses` float draws before succeeding.
    struct Misses {
        misses: usize,
    }

    impl RandomSource for Misses {
        fn integer(&mut self, _low: usize, high: usize) -> usize {
            high
        }

        fn float(&mut self) -> f64 {
            if self.misses == 0 {
                0.0
            } else {
                self.misses -= 1;
                0.99
            }
        }
    }

    #[test]
    fn it_selects_the_best_of_the_slate_when_the_first_draw_wins() {
        let tournament = Tournament::new(4, 0.6);
        for _ in 0..10 {
            assert_eq!(tournament.select_index(&mut Fixed(0.1), 10, &[]).unwrap(), 0);
        }
    }

    #[test]
    fn it_wraps_around_the_slate() {
        let tournament = Tournament::new(3, 0.5);
        // Slate is the sorted sample; four misses wrap to the second entry.
        let mut rng = Misses { misses: 4 };
        let population_len = 5;
        let index = tournament.select_index(&mut rng, population_len, &[]).unwrap();

        let mut check = Misses { misses: 0 };
        let mut slate = sample_indices(&mut check, population_len, 3);
        slate.sort_unstable();
        assert_eq!(index, slate[1]);
    }

    #[test]
    fn it_never_selects_excluded_indices() {
        let tournament = Tournament::new(3, 0.7);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let index = tournament.select_index(&mut rng, 6, &[0, 2]).unwrap();
            assert!(index != 0 && index != 2 && index < 6);
        }
    }

    #[test]
    fn it_fails_when_every_index_is_excluded() {
        let tournament = Tournament::new(2, 0.7);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            tournament.select_index(&mut rng, 1, &[0]).unwrap_err(),
            SelectionError::NoValidParents
        );
    }

    #[test]
    fn it_picks_uniformly_without_probability_mass() {
        let tournament = Tournament::new(3, 0.0);
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..50 {
            assert!(tournament.select_index(&mut rng, 5, &[]).unwrap() < 5);
        }
    }
}
