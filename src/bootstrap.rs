use crate::models::{JobParameters, ServicePlanner, Simulator};
use crate::repositories::files::FileStore;
use crate::services::optimization::{Service, ServiceBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

pub struct Configuration {
    data_directory: PathBuf,
}

impl Configuration {
    pub fn new(data_directory: impl Into<PathBuf>) -> Self {
        Self {
            data_directory: data_directory.into(),
        }
    }
}

/// Builds an optimizer whose job state and cache live under the configured
/// data directory.
pub async fn bootstrap_optimizer(
    config: Configuration,
    job_id: Uuid,
    parameters: JobParameters,
    simulator: Arc<dyn Simulator>,
    planner: Arc<dyn ServicePlanner>,
) -> anyhow::Result<ServiceBuilder> {
    tokio::fs::create_dir_all(&config.data_directory).await?;
    let store = Arc::new(FileStore::new(config.data_directory));

    Ok(Service::builder(
        job_id,
        parameters,
        store.clone(),
        store,
        simulator,
        planner,
    ))
}
