pub mod files;
pub mod memory;

use crate::models::{CandidateSummary, Checkpoint, LevelOfService, LineCollection, Scenario};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend error: {0}")]
    Backend(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    #[default]
    Pending,
    InProgress,
    Paused,
    Completed,
    Failed,
}

/// Durable progress of a job, besides its checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    pub status: JobStatus,
    /// Lines and levels of service are in the cache.
    pub data_prepared: bool,
    /// Drawn once per job so that a resumed run keeps it.
    pub population_size: Option<usize>,
    /// Next generation to run, starting at 1.
    pub current_generation: u32,
    /// Best candidate of each finished generation.
    pub generations: Vec<CandidateSummary>,
    /// Ids returned by the job store for exported scenarios.
    pub saved_scenarios: Vec<Uuid>,
    /// Generations whose best scenarios were already exported.
    #[serde(default)]
    pub exported_generations: Vec<u32>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            status: JobStatus::Pending,
            data_prepared: false,
            population_size: None,
            current_generation: 1,
            generations: Vec::new(),
            saved_scenarios: Vec::new(),
            exported_generations: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            updated_at: None,
        }
    }
}

impl JobState {
    pub(crate) fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// Job persistence: state, checkpoint, candidate results and exported scenarios.
pub trait JobStore: Send + Sync {
    fn read_state<'a>(&'a self, job_id: Uuid) -> BoxFuture<'a, Result<Option<JobState>, Error>>;

    fn persist_state<'a>(
        &'a self,
        job_id: Uuid,
        state: &'a JobState,
    ) -> BoxFuture<'a, Result<(), Error>>;

    fn read_checkpoint<'a>(
        &'a self,
        job_id: Uuid,
    ) -> BoxFuture<'a, Result<Option<Checkpoint>, Error>>;

    fn persist_checkpoint<'a>(
        &'a self,
        job_id: Uuid,
        checkpoint: &'a Checkpoint,
    ) -> BoxFuture<'a, Result<(), Error>>;

    fn persist_candidate_result<'a>(
        &'a self,
        job_id: Uuid,
        generation_index: u32,
        candidate_index: usize,
        summary: &'a CandidateSummary,
    ) -> BoxFuture<'a, Result<(), Error>>;

    /// Stores a scenario durably under its own name, returning its new id.
    fn save_scenario<'a>(
        &'a self,
        job_id: Uuid,
        scenario: &'a Scenario,
    ) -> BoxFuture<'a, Result<Uuid, Error>>;
}

/// Run data cache: line ordering, levels of service and prepared scenarios.
pub trait CacheStore: Send + Sync {
    fn load_line_collection<'a>(
        &'a self,
        job_id: Uuid,
    ) -> BoxFuture<'a, Result<Option<LineCollection>, Error>>;

    fn persist_line_collection<'a>(
        &'a self,
        job_id: Uuid,
        lines: &'a LineCollection,
    ) -> BoxFuture<'a, Result<(), Error>>;

    fn load_line_levels_of_service<'a>(
        &'a self,
        job_id: Uuid,
        line_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Vec<LevelOfService>>, Error>>;

    fn persist_line_levels_of_service<'a>(
        &'a self,
        job_id: Uuid,
        line_id: &'a str,
        levels: &'a [LevelOfService],
    ) -> BoxFuture<'a, Result<(), Error>>;

    fn load_scenario<'a>(
        &'a self,
        job_id: Uuid,
        scenario_id: Uuid,
    ) -> BoxFuture<'a, Result<Option<Scenario>, Error>>;

    fn persist_scenario<'a>(
        &'a self,
        job_id: Uuid,
        scenario: &'a Scenario,
    ) -> BoxFuture<'a, Result<(), Error>>;
}
