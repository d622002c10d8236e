//! JSON files on disk, one directory per job.
//!
//! ```text
//! {root}/{job_id}/state.json
//! {root}/{job_id}/checkpoint.json
//! {root}/{job_id}/results/gen{g}_c{i}.json
//! {root}/{job_id}/saved/{scenario_id}.json
//! {root}/{job_id}/cache/lines.json
//! {root}/{job_id}/cache/levels_of_service.json
//! {root}/{job_id}/cache/scenarios/{scenario_id}.json
//! ```
//!
//! Every write goes to a temporary file renamed over the target, so a
//! process killed mid-write leaves the previous version in place.

use super::{CacheStore, Error, JobState, JobStore};
use crate::models::{CandidateSummary, Checkpoint, LevelOfService, LineCollection, Scenario};
use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

type LevelsByLine = BTreeMap<String, Vec<LevelOfService>>;

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    // Serializes read-modify-write cycles on the levels of service file.
    levels_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            levels_lock: Arc::new(Mutex::new(())),
        }
    }

    fn job_dir(&self, job_id: Uuid) -> PathBuf {
        self.root.join(job_id.to_string())
    }

    fn cache_dir(&self, job_id: Uuid) -> PathBuf {
        self.job_dir(job_id).join("cache")
    }
}

#[instrument(level = "debug", skip(value), fields(path = %path.display()))]
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, Error> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error.into()),
    }
}

impl JobStore for FileStore {
    fn read_state<'a>(&'a self, job_id: Uuid) -> BoxFuture<'a, Result<Option<JobState>, Error>> {
        Box::pin(async move { read_json(&self.job_dir(job_id).join("state.json")).await })
    }

    fn persist_state<'a>(
        &'a self,
        job_id: Uuid,
        state: &'a JobState,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move { write_json(&self.job_dir(job_id).join("state.json"), state).await })
    }

    fn read_checkpoint<'a>(
        &'a self,
        job_id: Uuid,
    ) -> BoxFuture<'a, Result<Option<Checkpoint>, Error>> {
        Box::pin(async move { read_json(&self.job_dir(job_id).join("checkpoint.json")).await })
    }

    fn persist_checkpoint<'a>(
        &'a self,
        job_id: Uuid,
        checkpoint: &'a Checkpoint,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            write_json(&self.job_dir(job_id).join("checkpoint.json"), checkpoint).await
        })
    }

    fn persist_candidate_result<'a>(
        &'a self,
        job_id: Uuid,
        generation_index: u32,
        candidate_index: usize,
        summary: &'a CandidateSummary,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let path = self
                .job_dir(job_id)
                .join("results")
                .join(format!("gen{generation_index}_c{candidate_index}.json"));
            write_json(&path, summary).await
        })
    }

    fn save_scenario<'a>(
        &'a self,
        job_id: Uuid,
        scenario: &'a Scenario,
    ) -> BoxFuture<'a, Result<Uuid, Error>> {
        Box::pin(async move {
            let saved = Scenario::new(scenario.name.clone(), scenario.services.clone());
            let path = self
                .job_dir(job_id)
                .join("saved")
                .join(format!("{}.json", saved.id));
            write_json(&path, &saved).await?;
            Ok(saved.id)
        })
    }
}

impl CacheStore for FileStore {
    fn load_line_collection<'a>(
        &'a self,
        job_id: Uuid,
    ) -> BoxFuture<'a, Result<Option<LineCollection>, Error>> {
        Box::pin(async move { read_json(&self.cache_dir(job_id).join("lines.json")).await })
    }

    fn persist_line_collection<'a>(
        &'a self,
        job_id: Uuid,
        lines: &'a LineCollection,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move { write_json(&self.cache_dir(job_id).join("lines.json"), lines).await })
    }

    fn load_line_levels_of_service<'a>(
        &'a self,
        job_id: Uuid,
        line_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Vec<LevelOfService>>, Error>> {
        Box::pin(async move {
            let _guard = self.levels_lock.lock().await;
            let path = self.cache_dir(job_id).join("levels_of_service.json");
            let levels: Option<LevelsByLine> = read_json(&path).await?;
            Ok(levels.and_then(|mut levels| levels.remove(line_id)))
        })
    }

    fn persist_line_levels_of_service<'a>(
        &'a self,
        job_id: Uuid,
        line_id: &'a str,
        levels: &'a [LevelOfService],
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let _guard = self.levels_lock.lock().await;
            let path = self.cache_dir(job_id).join("levels_of_service.json");
            let mut all: LevelsByLine = read_json(&path).await?.unwrap_or_default();
            all.insert(line_id.to_string(), levels.to_vec());
            write_json(&path, &all).await
        })
    }

    fn load_scenario<'a>(
        &'a self,
        job_id: Uuid,
        scenario_id: Uuid,
    ) -> BoxFuture<'a, Result<Option<Scenario>, Error>> {
        Box::pin(async move {
            let path = self
                .cache_dir(job_id)
                .join("scenarios")
                .join(format!("{scenario_id}.json"));
            read_json(&path).await
        })
    }

    fn persist_scenario<'a>(
        &'a self,
        job_id: Uuid,
        scenario: &'a Scenario,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let path = self
                .cache_dir(job_id)
                .join("scenarios")
                .join(format!("{}.json", scenario.id));
            write_json(&path, scenario).await
        })
    }
}
