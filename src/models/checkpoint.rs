use crate::models::Chromosome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chromosome together with the cached scenario it was prepared into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointCandidate {
    pub chromosome: Chromosome,
    /// `None` when scenario preparation failed for this candidate.
    #[serde(default)]
    pub scenario_id: Option<Uuid>,
}

/// The unit of crash resumption.
///
/// An unsimulated checkpoint is written once a generation's scenarios are
/// prepared; resuming rehydrates that generation and simulates it again. A
/// simulated checkpoint holds the ranked, valid chromosomes of a finished
/// generation and seeds the reproduction of the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub generation_index: u32,
    pub candidates: Vec<CheckpointCandidate>,
    #[serde(default)]
    pub simulated: bool,
}

impl Checkpoint {
    pub fn prepared(generation_index: u32, candidates: Vec<CheckpointCandidate>) -> Self {
        Self {
            generation_index,
            candidates,
            simulated: false,
        }
    }

    pub fn simulated(generation_index: u32, ranked: Vec<Chromosome>) -> Self {
        Self {
            generation_index,
            candidates: ranked
                .into_iter()
                .map(|chromosome| CheckpointCandidate {
                    chromosome,
                    scenario_id: None,
                })
                .collect(),
            simulated: true,
        }
    }

    pub fn chromosomes(&self) -> Vec<Chromosome> {
        self.candidates
            .iter()
            .map(|candidate| candidate.chromosome.clone())
            .collect()
    }
}
