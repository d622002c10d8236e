use crate::models::random::RandomSource;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Single bit-flip mutation outside the protected prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mutation {
    probability: f64,
}

impl Mutation {
    pub fn new(probability: f64) -> Self {
        Self { probability }
    }

    /// Flips one unprotected gene with the configured probability.
    #[instrument(level = "debug", skip(self, rng, genes), fields(probability = self.probability, protected = protected))]
    pub fn mutate<R: RandomSource + ?Sized>(
        &self,
        rng: &mut R,
        mut genes: Vec<bool>,
        protected: usize,
    ) -> Vec<bool> {
        if protected >= genes.len() || rng.float() >= self.probability {
            return genes;
        }

        let index = rng.integer(protected, genes.len() - 1);
        genes[index] = !genes[index];
        genes
    }
}
