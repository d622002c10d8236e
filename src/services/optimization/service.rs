use super::Error;
use crate::models::{
    Cancellation, Candidate, Checkpoint, Chromosome, JobParameters, Line, LineCollection,
    LineServices, PlanningError, RandomSource, RankedMethod, Randomness, RunContext,
    ServiceConstraints, ServicePlanner, Simulator, knows_service, sort_levels,
};
use crate::repositories::{CacheStore, JobState, JobStatus, JobStore};
use crate::services::generation::Generation;
use crate::services::population::{Breeder, GenomeLayout};
use crate::services::queue::TaskQueue;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// How a call to [`Service::run`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Cancellation was observed; calling `run` again resumes at `next_generation`.
    Paused { next_generation: u32 },
    /// Every error message persisted for the job so far.
    Failed { errors: Vec<String> },
}

// optimization service
pub struct Service {
    pub(super) job_id: Uuid,
    pub(super) parameters: JobParameters,
    pub(super) methods: Vec<RankedMethod>,
    pub(super) jobs: Arc<dyn JobStore>,
    pub(super) cache: Arc<dyn CacheStore>,
    pub(super) simulator: Arc<dyn Simulator>,
    pub(super) planner: Arc<dyn ServicePlanner>,
    pub(super) cancellation: Arc<dyn Cancellation>,
    pub(super) randomness: Randomness,
    pub(super) preparation_queue: TaskQueue,
    pub(super) simulation_queue: TaskQueue,
}

impl Service {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Runs the job from wherever its persisted state and checkpoint left it.
    ///
    /// Run-level failures are persisted on the job and returned as
    /// [`RunOutcome::Failed`]; only a failure to persist that state is an `Err`.
    #[instrument(level = "info", skip(self), fields(job_id = %self.job_id, generations = self.parameters.algorithm.number_of_generations))]
    pub async fn run(&self) -> Result<RunOutcome, Error> {
        let started = Instant::now();
        let mut state = self
            .jobs
            .read_state(self.job_id)
            .await?
            .unwrap_or_default();

        if state.status == JobStatus::Completed {
            tracing::info!("Job already completed");
            return Ok(RunOutcome::Completed);
        }

        state.status = JobStatus::InProgress;
        state.touch();
        self.jobs.persist_state(self.job_id, &state).await?;

        match self.run_generations(&mut state).await {
            Ok(outcome) => {
                tracing::info!(
                    outcome = ?outcome,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Optimization run ended"
                );
                Ok(outcome)
            }
            Err(error) => {
                tracing::error!(%error, "Optimization run failed");
                state.status = JobStatus::Failed;
                state.errors.push(error.to_string());
                state.touch();
                self.jobs.persist_state(self.job_id, &state).await?;
                Ok(RunOutcome::Failed {
                    errors: state.errors.clone(),
                })
            }
        }
    }

    async fn run_generations(&self, state: &mut JobState) -> Result<RunOutcome, Error> {
        let context = self.prepare_data(state).await?;
        let population_size = self.population_size(state).await?;

        let options = &self.parameters.algorithm;
        let total = options.number_of_generations;
        let layout = GenomeLayout::new(
            context.lines.len(),
            context.lines.protected(),
            &self.parameters.network,
        );
        let breeder = Breeder::new(options, layout, population_size);

        let (mut previous, mut pending) = self.restore_checkpoint(state).await?;

        while state.current_generation <= total {
            let index = state.current_generation;

            let mut generation = match pending.take() {
                Some(checkpoint) => self.resume_generation(checkpoint, &context).await?,
                None => {
                    let chromosomes = if index == 1 {
                        self.randomness
                            .with(|rng| breeder.generate_first_chromosomes(rng))?
                    } else {
                        let parents = previous.as_deref().ok_or_else(|| {
                            Error::ResumeIntegrity(format!(
                                "no ranked generation {} to reproduce from",
                                index - 1
                            ))
                        })?;
                        self.randomness
                            .with(|rng| breeder.reproduce_chromosomes(rng, parents, index))?
                    };

                    let mut generation =
                        Generation::new(index, chromosomes, &context, self.methods.clone());
                    let warnings = generation
                        .prepare_candidates(
                            self.cache.as_ref(),
                            self.job_id,
                            &self.randomness,
                            &self.preparation_queue,
                            options.population_size_min,
                        )
                        .await?;
                    state.warnings.extend(warnings);

                    // Must be durable before any simulation starts.
                    self.jobs
                        .persist_checkpoint(self.job_id, &generation.checkpoint())
                        .await?;
                    generation
                }
            };

            let warnings = generation
                .simulate(self.simulator.as_ref(), &self.simulation_queue)
                .await?;
            state.warnings.extend(warnings);

            self.record_generation(state, &generation).await?;

            let ranked = generation.ranked_chromosomes();
            self.jobs
                .persist_checkpoint(self.job_id, &Checkpoint::simulated(index, ranked.clone()))
                .await?;
            previous = Some(ranked);

            state.current_generation = index + 1;
            state.touch();
            self.jobs.persist_state(self.job_id, state).await?;

            if index < total && self.cancellation.is_cancelled().await {
                tracing::info!(next_generation = index + 1, "Cancellation observed, pausing");
                state.status = JobStatus::Paused;
                state.touch();
                self.jobs.persist_state(self.job_id, state).await?;
                return Ok(RunOutcome::Paused {
                    next_generation: index + 1,
                });
            }
        }

        state.status = JobStatus::Completed;
        state.touch();
        self.jobs.persist_state(self.job_id, state).await?;
        Ok(RunOutcome::Completed)
    }

    /// Produces the line ordering and levels of service on the first run,
    /// restores them from the cache afterwards.
    #[instrument(level = "info", skip(self, state), fields(job_id = %self.job_id, data_prepared = state.data_prepared))]
    async fn prepare_data(&self, state: &mut JobState) -> Result<Arc<RunContext>, Error> {
        let network = &self.parameters.network;

        let (lines, line_services) = if state.data_prepared {
            let lines = self
                .cache
                .load_line_collection(self.job_id)
                .await?
                .ok_or_else(|| {
                    Error::ResumeIntegrity("line collection missing from cache".to_string())
                })?;

            let mut line_services = LineServices::new();
            for line in lines.lines() {
                let levels = self
                    .cache
                    .load_line_levels_of_service(self.job_id, &line.id)
                    .await?
                    .ok_or_else(|| {
                        Error::ResumeIntegrity(format!(
                            "levels of service missing from cache for line {}",
                            line.id
                        ))
                    })?;
                line_services.insert(line.id.clone(), levels);
            }
            (lines, line_services)
        } else {
            let lines =
                LineCollection::ordered(self.parameters.lines.clone(), &network.lines_to_keep);
            let constraints = ServiceConstraints {
                job_id: self.job_id,
                nb_of_vehicles: network.nb_of_vehicles,
                min_time_between_passages: network.min_time_between_passages,
                max_time_between_passages: network.max_time_between_passages,
            };

            let mut line_services = LineServices::new();
            for line in lines.lines() {
                let mut levels = self
                    .planner
                    .prepare_services_for_line(line, &constraints)
                    .await
                    .map_err(|error| planning_error(line, error))?;
                sort_levels(&mut levels);
                self.cache
                    .persist_line_levels_of_service(self.job_id, &line.id, &levels)
                    .await?;
                line_services.insert(line.id.clone(), levels);
            }
            self.cache
                .persist_line_collection(self.job_id, &lines)
                .await?;

            state.data_prepared = true;
            state.touch();
            self.jobs.persist_state(self.job_id, state).await?;
            (lines, line_services)
        };

        tracing::info!(
            lines = lines.len(),
            protected = lines.protected(),
            "Run data ready"
        );

        Ok(Arc::new(RunContext {
            job_id: self.job_id,
            lines,
            line_services,
            nb_of_vehicles: network.nb_of_vehicles,
            non_simulated_services: network.non_simulated_services.clone(),
        }))
    }

    async fn population_size(&self, state: &mut JobState) -> Result<usize, Error> {
        if let Some(size) = state.population_size {
            return Ok(size);
        }

        let options = &self.parameters.algorithm;
        let size = self.randomness.with(|rng| {
            rng.integer(options.population_size_min, options.population_size_max)
        });
        state.population_size = Some(size);
        state.touch();
        self.jobs.persist_state(self.job_id, state).await?;
        tracing::debug!(population_size = size, "Population size drawn");
        Ok(size)
    }

    /// Reads the checkpoint into the ranked parents of the next generation, or
    /// a prepared generation still waiting for its simulation.
    async fn restore_checkpoint(
        &self,
        state: &mut JobState,
    ) -> Result<(Option<Vec<Chromosome>>, Option<Checkpoint>), Error> {
        let Some(checkpoint) = self.jobs.read_checkpoint(self.job_id).await? else {
            return Ok((None, None));
        };

        if checkpoint.simulated {
            if checkpoint.generation_index >= state.current_generation {
                state.current_generation = checkpoint.generation_index + 1;
                state.touch();
                self.jobs.persist_state(self.job_id, state).await?;
            }
            let previous = (checkpoint.generation_index + 1 == state.current_generation)
                .then(|| checkpoint.chromosomes());
            return Ok((previous, None));
        }

        if checkpoint.generation_index != state.current_generation {
            return Err(Error::ResumeIntegrity(format!(
                "checkpoint of generation {} cannot resume generation {}",
                checkpoint.generation_index, state.current_generation
            )));
        }

        Ok((None, Some(checkpoint)))
    }

    #[instrument(level = "info", skip(self, checkpoint, context), fields(job_id = %self.job_id, generation_index = checkpoint.generation_index))]
    async fn resume_generation(
        &self,
        checkpoint: Checkpoint,
        context: &Arc<RunContext>,
    ) -> Result<Generation, Error> {
        let mut candidates = Vec::with_capacity(checkpoint.candidates.len());

        for entry in checkpoint.candidates {
            let genes = entry.chromosome.lines().len();
            if genes != context.lines.len() {
                return Err(Error::ResumeIntegrity(format!(
                    "chromosome {} has {genes} genes for {} lines",
                    entry.chromosome.name(),
                    context.lines.len()
                )));
            }

            let scenario = match entry.scenario_id {
                Some(id) => {
                    let scenario = self
                        .cache
                        .load_scenario(self.job_id, id)
                        .await?
                        .ok_or_else(|| {
                            Error::ResumeIntegrity(format!("scenario {id} missing from cache"))
                        })?;

                    let unknown = scenario.services.iter().find(|service| {
                        !knows_service(&context.line_services, service)
                            && !context.non_simulated_services.contains(service)
                    });
                    if let Some(service) = unknown {
                        return Err(Error::ResumeIntegrity(format!(
                            "scenario {} references unknown service {service}",
                            scenario.name
                        )));
                    }
                    Some(scenario)
                }
                None => None,
            };

            candidates.push(Candidate::with_scenario(
                entry.chromosome,
                Arc::clone(context),
                scenario,
            ));
        }

        tracing::info!(
            candidates = candidates.len(),
            "Generation resumed from checkpoint"
        );
        Ok(Generation::resume(
            checkpoint.generation_index,
            candidates,
            self.methods.clone(),
        ))
    }

    /// Persists what a ranked generation leaves behind: its best summary,
    /// exported scenarios and every candidate result.
    #[instrument(level = "info", skip(self, state, generation), fields(job_id = %self.job_id, generation_index = generation.index()))]
    async fn record_generation(
        &self,
        state: &mut JobState,
        generation: &Generation,
    ) -> Result<(), Error> {
        let index = generation.index();
        let options = &self.parameters.algorithm;

        state.generations.truncate(index.saturating_sub(1) as usize);
        if let Some(best) = generation.serialize_best_result()? {
            tracing::info!(
                best = %best.name,
                total_fitness = ?best.result.as_ref().and_then(|result| result.total_fitness),
                "Generation ranked"
            );
            state.generations.push(best);
        }

        let exported = state.exported_generations.contains(&index);
        if index + options.keep_generations > options.number_of_generations && !exported {
            for scenario in generation.best_scenarios(options.keep_candidates) {
                match self.jobs.save_scenario(self.job_id, scenario).await {
                    Ok(id) => state.saved_scenarios.push(id),
                    Err(error) => {
                        tracing::warn!(scenario = %scenario.name, %error, "Scenario export failed");
                        state
                            .warnings
                            .push(format!("{}: export failed: {error}", scenario.name));
                    }
                }
            }
            // Recorded right away so a resumed run never saves these scenarios twice.
            state.exported_generations.push(index);
            state.touch();
            self.jobs.persist_state(self.job_id, state).await?;
        }

        for (position, summary) in generation.summaries() {
            match summary {
                Ok(summary) => {
                    self.jobs
                        .persist_candidate_result(self.job_id, index, position, &summary)
                        .await?
                }
                Err(error) => {
                    tracing::warn!(position, %error, "Candidate could not be serialized");
                    state.warnings.push(format!("C{position}: {error}"));
                }
            }
        }

        Ok(())
    }
}

fn planning_error(line: &Line, error: PlanningError) -> Error {
    match error {
        PlanningError::PathNotConfigured { line } => Error::PathNotConfigured { line },
        PlanningError::TooFewTrips { line, vehicles } => Error::TooFewTrips { line, vehicles },
        PlanningError::Other(source) => Error::ServicePreparation {
            line: line.id.clone(),
            source,
        },
    }
}
