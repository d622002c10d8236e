use super::{Error, Service};
use crate::models::{
    Cancellation, JobParameters, NeverCancelled, RandomSource, RankedMethod, Randomness,
    ServicePlanner, Simulator, seeded,
};
use crate::repositories::{CacheStore, JobStore};
use crate::services::queue::TaskQueue;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

pub struct ServiceBuilder {
    pub(super) job_id: Uuid,
    pub(super) parameters: JobParameters,
    pub(super) jobs: Arc<dyn JobStore>,
    pub(super) cache: Arc<dyn CacheStore>,
    pub(super) simulator: Arc<dyn Simulator>,
    pub(super) planner: Arc<dyn ServicePlanner>,
    pub(super) cancellation: Arc<dyn Cancellation>,
    pub(super) randomness: Option<Randomness>,
    pub(super) preparation_concurrency: usize,
    pub(super) simulation_concurrency: usize,
}

impl ServiceBuilder {
    pub fn with_cancellation(mut self, cancellation: Arc<dyn Cancellation>) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Replaces the generator seeded from the job parameters.
    pub fn with_random_source(mut self, source: impl RandomSource + 'static) -> Self {
        self.randomness = Some(Randomness::new(source));
        self
    }

    pub fn with_preparation_concurrency(mut self, concurrency: usize) -> Self {
        self.preparation_concurrency = concurrency;
        self
    }

    pub fn with_simulation_concurrency(mut self, concurrency: usize) -> Self {
        self.simulation_concurrency = concurrency;
        self
    }

    #[instrument(level = "debug", skip(self), fields(job_id = %self.job_id, methods = self.parameters.simulation_methods.len()))]
    pub fn build(self) -> Result<Service, Error> {
        self.parameters.validate()?;
        let methods = self
            .parameters
            .simulation_methods
            .iter()
            .map(|config| config.resolve())
            .collect::<Result<Vec<RankedMethod>, _>>()?;

        let randomness = self
            .randomness
            .unwrap_or_else(|| Randomness::new(seeded(self.parameters.seed)));

        Ok(Service {
            job_id: self.job_id,
            parameters: self.parameters,
            methods,
            jobs: self.jobs,
            cache: self.cache,
            simulator: self.simulator,
            planner: self.planner,
            cancellation: self.cancellation,
            randomness,
            preparation_queue: TaskQueue::new(self.preparation_concurrency),
            simulation_queue: TaskQueue::new(self.simulation_concurrency),
        })
    }
}

impl Service {
    pub fn builder(
        job_id: Uuid,
        parameters: JobParameters,
        jobs: Arc<dyn JobStore>,
        cache: Arc<dyn CacheStore>,
        simulator: Arc<dyn Simulator>,
        planner: Arc<dyn ServicePlanner>,
    ) -> ServiceBuilder {
        ServiceBuilder {
            job_id,
            parameters,
            jobs,
            cache,
            simulator,
            planner,
            cancellation: Arc::new(NeverCancelled),
            randomness: None,
            preparation_concurrency: 1,
            simulation_concurrency: 1,
        }
    }
}
