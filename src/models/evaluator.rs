use crate::models::{LevelOfService, Line, MethodResult, Scenario, SimulationMethod};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// The simulation oracle: scores one scenario with one method.
pub trait Simulator: Send + Sync {
    fn simulate<'a>(
        &'a self,
        method: SimulationMethod,
        scenario: &'a Scenario,
    ) -> BoxFuture<'a, Result<MethodResult, anyhow::Error>>;
}

/// Limits handed to the service planner for every line of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConstraints {
    pub job_id: Uuid,
    pub nb_of_vehicles: u32,
    /// Minutes.
    pub min_time_between_passages: u32,
    /// Minutes.
    pub max_time_between_passages: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum PlanningError {
    #[error("Path not properly configured for line {line}")]
    PathNotConfigured { line: String },
    #[error("Too few trips were generated for line {line} with {vehicles} vehicles")]
    TooFewTrips { line: String, vehicles: u32 },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Produces the levels of service available for a line.
pub trait ServicePlanner: Send + Sync {
    fn prepare_services_for_line<'a>(
        &'a self,
        line: &'a Line,
        constraints: &'a ServiceConstraints,
    ) -> BoxFuture<'a, Result<Vec<LevelOfService>, PlanningError>>;
}

/// Cooperative cancellation, polled between generations.
pub trait Cancellation: Send + Sync {
    fn is_cancelled(&self) -> BoxFuture<'_, bool>;
}

/// In-process cancellation switch.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Cancellation for CancellationFlag {
    fn is_cancelled(&self) -> BoxFuture<'_, bool> {
        let cancelled = self.0.load(Ordering::SeqCst);
        Box::pin(async move { cancelled })
    }
}

/// Never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancelled;

impl Cancellation for NeverCancelled {
    fn is_cancelled(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { false })
    }
}
