use super::{CacheStore, Error, JobState, JobStore};
use crate::models::{CandidateSummary, Checkpoint, LevelOfService, LineCollection, Scenario};
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
struct JobRecord {
    state: Option<JobState>,
    checkpoint: Option<Checkpoint>,
    results: BTreeMap<(u32, usize), CandidateSummary>,
    saved_scenarios: Vec<Scenario>,
    lines: Option<LineCollection>,
    levels: HashMap<String, Vec<LevelOfService>>,
    scenarios: HashMap<Uuid, Scenario>,
}

/// In-process job store and cache.
///
/// Clones share the same records, so a second service built on a clone sees
/// everything the first one persisted.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    jobs: Arc<Mutex<HashMap<Uuid, JobRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, JobRecord>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_job<T>(&self, job_id: Uuid, f: impl FnOnce(&mut JobRecord) -> T) -> T {
        let mut jobs = self.lock();
        f(jobs.entry(job_id).or_default())
    }

    /// Persisted candidate results of a generation, ordered by candidate index.
    pub fn candidate_results(&self, job_id: Uuid, generation_index: u32) -> Vec<CandidateSummary> {
        self.with_job(job_id, |job| {
            job.results
                .iter()
                .filter(|((generation, _), _)| *generation == generation_index)
                .map(|(_, summary)| summary.clone())
                .collect()
        })
    }

    /// Scenarios exported through [`JobStore::save_scenario`].
    pub fn saved_scenarios(&self, job_id: Uuid) -> Vec<Scenario> {
        self.with_job(job_id, |job| job.saved_scenarios.clone())
    }

    pub fn cached_scenario_count(&self, job_id: Uuid) -> usize {
        self.with_job(job_id, |job| job.scenarios.len())
    }
}

impl JobStore for MemoryStore {
    fn read_state<'a>(&'a self, job_id: Uuid) -> BoxFuture<'a, Result<Option<JobState>, Error>> {
        let state = self.with_job(job_id, |job| job.state.clone());
        Box::pin(async move { Ok(state) })
    }

    fn persist_state<'a>(
        &'a self,
        job_id: Uuid,
        state: &'a JobState,
    ) -> BoxFuture<'a, Result<(), Error>> {
        self.with_job(job_id, |job| job.state = Some(state.clone()));
        Box::pin(async { Ok(()) })
    }

    fn read_checkpoint<'a>(
        &'a self,
        job_id: Uuid,
    ) -> BoxFuture<'a, Result<Option<Checkpoint>, Error>> {
        let checkpoint = self.with_job(job_id, |job| job.checkpoint.clone());
        Box::pin(async move { Ok(checkpoint) })
    }

    fn persist_checkpoint<'a>(
        &'a self,
        job_id: Uuid,
        checkpoint: &'a Checkpoint,
    ) -> BoxFuture<'a, Result<(), Error>> {
        self.with_job(job_id, |job| job.checkpoint = Some(checkpoint.clone()));
        Box::pin(async { Ok(()) })
    }

    fn persist_candidate_result<'a>(
        &'a self,
        job_id: Uuid,
        generation_index: u32,
        candidate_index: usize,
        summary: &'a CandidateSummary,
    ) -> BoxFuture<'a, Result<(), Error>> {
        self.with_job(job_id, |job| {
            job.results
                .insert((generation_index, candidate_index), summary.clone())
        });
        Box::pin(async { Ok(()) })
    }

    fn save_scenario<'a>(
        &'a self,
        job_id: Uuid,
        scenario: &'a Scenario,
    ) -> BoxFuture<'a, Result<Uuid, Error>> {
        let saved = Scenario::new(scenario.name.clone(), scenario.services.clone());
        let id = saved.id;
        self.with_job(job_id, |job| job.saved_scenarios.push(saved));
        Box::pin(async move { Ok(id) })
    }
}

impl CacheStore for MemoryStore {
    fn load_line_collection<'a>(
        &'a self,
        job_id: Uuid,
    ) -> BoxFuture<'a, Result<Option<LineCollection>, Error>> {
        let lines = self.with_job(job_id, |job| job.lines.clone());
        Box::pin(async move { Ok(lines) })
    }

    fn persist_line_collection<'a>(
        &'a self,
        job_id: Uuid,
        lines: &'a LineCollection,
    ) -> BoxFuture<'a, Result<(), Error>> {
        self.with_job(job_id, |job| job.lines = Some(lines.clone()));
        Box::pin(async { Ok(()) })
    }

    fn load_line_levels_of_service<'a>(
        &'a self,
        job_id: Uuid,
        line_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Vec<LevelOfService>>, Error>> {
        let levels = self.with_job(job_id, |job| job.levels.get(line_id).cloned());
        Box::pin(async move { Ok(levels) })
    }

    fn persist_line_levels_of_service<'a>(
        &'a self,
        job_id: Uuid,
        line_id: &'a str,
        levels: &'a [LevelOfService],
    ) -> BoxFuture<'a, Result<(), Error>> {
        self.with_job(job_id, |job| {
            job.levels.insert(line_id.to_string(), levels.to_vec())
        });
        Box::pin(async { Ok(()) })
    }

    fn load_scenario<'a>(
        &'a self,
        job_id: Uuid,
        scenario_id: Uuid,
    ) -> BoxFuture<'a, Result<Option<Scenario>, Error>> {
        let scenario = self.with_job(job_id, |job| job.scenarios.get(&scenario_id).cloned());
        Box::pin(async move { Ok(scenario) })
    }

    fn persist_scenario<'a>(
        &'a self,
        job_id: Uuid,
        scenario: &'a Scenario,
    ) -> BoxFuture<'a, Result<(), Error>> {
        self.with_job(job_id, |job| {
            job.scenarios.insert(scenario.id, scenario.clone())
        });
        Box::pin(async { Ok(()) })
    }
}
