use crate::models::{
    Candidate, CandidateError, CandidateSummary, Checkpoint, CheckpointCandidate, Chromosome,
    RankedMethod, Randomness, RunContext, Scenario, Simulator, rank_product,
};
use crate::repositories::{self, CacheStore};
use crate::services::queue::TaskQueue;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Insufficient population: {valid} candidates have a valid scenario, {required} required")]
    InsufficientPopulation { valid: usize, required: usize },
    #[error("Generation {index} is {actual:?}, expected {expected:?}")]
    UnexpectedState {
        index: u32,
        actual: GenerationState,
        expected: GenerationState,
    },
    #[error("Cache error: {0}")]
    CacheError(#[from] repositories::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Created,
    Preparing,
    Prepared,
    Simulating,
    Ranked,
}

/// One generation's candidates, ordered best-first once ranked.
#[derive(Debug)]
pub struct Generation {
    index: u32,
    candidates: Vec<Candidate>,
    methods: Vec<RankedMethod>,
    state: GenerationState,
}

enum PreparationFailure {
    Candidate(String, CandidateError),
    Cache(repositories::Error),
}

impl Generation {
    pub fn new(
        index: u32,
        chromosomes: Vec<Chromosome>,
        context: &Arc<RunContext>,
        methods: Vec<RankedMethod>,
    ) -> Self {
        let candidates = chromosomes
            .into_iter()
            .map(|chromosome| Candidate::new(chromosome, Arc::clone(context)))
            .collect();

        Self {
            index,
            candidates,
            methods,
            state: GenerationState::Created,
        }
    }

    /// Rehydrates a generation whose scenarios were prepared before a restart.
    pub fn resume(index: u32, candidates: Vec<Candidate>, methods: Vec<RankedMethod>) -> Self {
        Self {
            index,
            candidates,
            methods,
            state: GenerationState::Prepared,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    fn expect_state(&self, expected: GenerationState) -> Result<(), Error> {
        if self.state != expected {
            return Err(Error::UnexpectedState {
                index: self.index,
                actual: self.state,
                expected,
            });
        }
        Ok(())
    }

    /// Prepares every candidate's scenario and caches it.
    ///
    /// Candidates that cannot be prepared are only warned about; the
    /// generation fails when fewer than `required` remain. Returns the
    /// warnings.
    #[instrument(level = "info", skip(self, cache, randomness, queue), fields(generation_index = self.index, candidates = self.candidates.len()))]
    pub async fn prepare_candidates(
        &mut self,
        cache: &dyn CacheStore,
        job_id: Uuid,
        randomness: &Randomness,
        queue: &TaskQueue,
        required: usize,
    ) -> Result<Vec<String>, Error> {
        self.expect_state(GenerationState::Created)?;
        self.state = GenerationState::Preparing;
        let started = Instant::now();

        let tasks = self.candidates.iter_mut().map(|candidate| async move {
            let name = candidate.chromosome().name().to_string();
            let prepared = randomness
                .with(|rng| candidate.prepare_scenario(rng).map(Scenario::clone));
            match prepared {
                Ok(scenario) => cache
                    .persist_scenario(job_id, &scenario)
                    .await
                    .map_err(PreparationFailure::Cache),
                Err(error) => Err(PreparationFailure::Candidate(name, error)),
            }
        });

        let mut warnings = Vec::new();
        for (_, outcome) in queue.settle_all(tasks).await {
            match outcome {
                Ok(()) => {}
                Err(PreparationFailure::Candidate(name, error)) => {
                    tracing::warn!(candidate = %name, %error, "Candidate preparation failed");
                    warnings.push(format!("{name}: {error}"));
                }
                Err(PreparationFailure::Cache(error)) => return Err(error.into()),
            }
        }

        let valid = self
            .candidates
            .iter()
            .filter(|candidate| candidate.scenario().is_some())
            .count();
        if valid < required {
            return Err(Error::InsufficientPopulation { valid, required });
        }

        self.state = GenerationState::Prepared;
        tracing::info!(
            valid,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Candidates prepared"
        );
        Ok(warnings)
    }

    /// Simulates every prepared candidate, then ranks the generation.
    #[instrument(level = "info", skip(self, simulator, queue), fields(generation_index = self.index))]
    pub async fn simulate(
        &mut self,
        simulator: &dyn Simulator,
        queue: &TaskQueue,
    ) -> Result<Vec<String>, Error> {
        self.expect_state(GenerationState::Prepared)?;
        self.state = GenerationState::Simulating;
        let started = Instant::now();

        let methods = &self.methods;
        let tasks = self
            .candidates
            .iter_mut()
            .filter(|candidate| candidate.scenario().is_some())
            .map(|candidate| async move {
                let name = candidate.chromosome().name().to_string();
                let outcome = candidate.simulate(simulator, methods).await.map(|_| ());
                (name, outcome)
            });

        let mut warnings = Vec::new();
        for (_, (name, outcome)) in queue.settle_all(tasks).await {
            if let Err(error) = outcome {
                tracing::warn!(candidate = %name, %error, "Candidate simulation failed");
                warnings.push(format!("{name}: {error}"));
            }
        }

        self.sort_candidates();
        self.state = GenerationState::Ranked;
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation simulated"
        );
        Ok(warnings)
    }

    /// Sets each simulated candidate's rank product and orders the
    /// generation by it; candidates without a result go last.
    fn sort_candidates(&mut self) {
        let ranked: Vec<usize> = (0..self.candidates.len())
            .filter(|&index| self.candidates[index].result().is_some())
            .collect();

        let fitness: Vec<Vec<f64>> = ranked
            .iter()
            .map(|&index| {
                let results = self.candidates[index].result().map(|result| &result.results);
                self.methods
                    .iter()
                    .map(|ranked| {
                        results
                            .and_then(|results| results.get(ranked.method.name()))
                            .map_or(f64::NAN, |result| result.fitness)
                    })
                    .collect()
            })
            .collect();

        let totals = rank_product(&self.methods, &fitness);
        for (&index, total) in ranked.iter().zip(totals) {
            if let Some(result) = self.candidates[index].result_mut() {
                result.total_fitness = Some(total);
            }
        }

        let total = |candidate: &Candidate| candidate.result().and_then(|result| result.total_fitness);
        self.candidates.sort_by(|a, b| match (total(a), total(b)) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }

    /// Summary of the best ranked candidate, if any was simulated.
    pub fn serialize_best_result(&self) -> Result<Option<CandidateSummary>, CandidateError> {
        self.candidates
            .first()
            .filter(|candidate| candidate.result().is_some())
            .map(Candidate::serialize)
            .transpose()
    }

    /// Up to `top` scenarios of the best ranked candidates.
    pub fn best_scenarios(&self, top: usize) -> Vec<&Scenario> {
        self.candidates
            .iter()
            .filter(|candidate| candidate.result().is_some())
            .filter_map(Candidate::scenario)
            .take(top)
            .collect()
    }

    /// Summaries of every candidate holding a scenario, keyed by position.
    pub fn summaries(&self) -> Vec<(usize, Result<CandidateSummary, CandidateError>)> {
        self.candidates
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.scenario().is_some())
            .map(|(index, candidate)| (index, candidate.serialize()))
            .collect()
    }

    /// The resumable form of a prepared generation.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::prepared(
            self.index,
            self.candidates
                .iter()
                .map(|candidate| CheckpointCandidate {
                    chromosome: candidate.chromosome().clone(),
                    scenario_id: candidate.scenario().map(|scenario| scenario.id),
                })
                .collect(),
        )
    }

    /// Simulated chromosomes, best first.
    pub fn ranked_chromosomes(&self) -> Vec<Chromosome> {
        self.candidates
            .iter()
            .filter(|candidate| {
                candidate
                    .result()
                    .is_some_and(|result| result.total_fitness.is_some())
            })
            .map(|candidate| candidate.chromosome().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        FitnessSorter, LevelOfService, Line, LineCollection, LineServices, MethodResult,
        SimulationMethod,
    };
    use crate::repositories::memory::MemoryStore;
    use futures::future::BoxFuture;
    use rand::{SeedableRng, rngs::StdRng};

    /// Scores a scenario by its number of services; fails on a chosen name.
    struct CountingSimulator {
        fail_for: Option<String>,
    }

    impl Simulator for CountingSimulator {
        fn simulate<'a>(
            &'a self,
            _method: SimulationMethod,
            scenario: &'a Scenario,
        ) -> BoxFuture<'a, Result<MethodResult, anyhow::Error>> {
            Box::pin(async move {
                if self
                    .fail_for
                    .as_deref()
                    .is_some_and(|name| scenario.name.ends_with(name))
                {
                    anyhow::bail!("routing failed");
                }
                Ok(MethodResult::new(scenario.services.len() as f64))
            })
        }
    }

    fn context() -> Arc<RunContext> {
        let lines = (0..4)
            .map(|index| Line::new(format!("l{index}"), format!("{index}")))
            .collect();
        let mut line_services = LineServices::new();
        for index in 0..4 {
            line_services.insert(
                format!("l{index}"),
                (1..=3)
                    .map(|vehicles| LevelOfService::new(vehicles, format!("l{index}_{vehicles}")))
                    .collect(),
            );
        }

        Arc::new(RunContext {
            job_id: Uuid::now_v7(),
            lines: LineCollection::ordered(lines, &[]),
            line_services,
            nb_of_vehicles: 4,
            non_simulated_services: Vec::new(),
        })
    }

    fn methods(sorter: FitnessSorter) -> Vec<RankedMethod> {
        vec![RankedMethod {
            method: SimulationMethod::OdTrips,
            weight: 1.0,
            sorter,
        }]
    }

    fn chromosomes() -> Vec<Chromosome> {
        vec![
            Chromosome::new(vec![true, false, false, false], "GALN_GEN0_C0"),
            Chromosome::new(vec![true, true, true, false], "GALN_GEN0_C1"),
            Chromosome::new(vec![true, true, true, true], "GALN_GEN0_C2"),
            Chromosome::new(vec![false, true, true, false], "GALN_GEN0_C3"),
        ]
    }

    #[tokio::test]
    async fn it_prepares_ranks_and_orders_candidates() -> anyhow::Result<()> {
        let context = context();
        let cache = MemoryStore::new();
        let randomness = Randomness::new(StdRng::seed_from_u64(1));
        let queue = TaskQueue::default();
        let mut generation = Generation::new(
            1,
            chromosomes(),
            &context,
            methods(FitnessSorter::Maximize),
        );

        let warnings = generation
            .prepare_candidates(&cache, context.job_id, &randomness, &queue, 2)
            .await?;
        assert_eq!(generation.state(), GenerationState::Prepared);
        assert_eq!(warnings.len(), 0);
        assert_eq!(cache.cached_scenario_count(context.job_id), 4);

        generation.simulate(&CountingSimulator { fail_for: None }, &queue).await?;
        assert_eq!(generation.state(), GenerationState::Ranked);

        let names: Vec<&str> = generation
            .candidates()
            .iter()
            .map(|candidate| candidate.chromosome().name())
            .collect();
        assert_eq!(
            names,
            vec!["GALN_GEN0_C2", "GALN_GEN0_C1", "GALN_GEN0_C3", "GALN_GEN0_C0"]
        );
        assert_eq!(generation.ranked_chromosomes().len(), 4);
        assert_eq!(
            generation.serialize_best_result()?.map(|best| best.name),
            Some("GALN_GEN0_C2".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn it_excludes_failed_candidates_from_the_ranking() -> anyhow::Result<()> {
        // Four lines at their lowest level already need more than three vehicles.
        let context = Arc::new(RunContext {
            nb_of_vehicles: 3,
            ..(*context()).clone()
        });
        let cache = MemoryStore::new();
        let randomness = Randomness::new(StdRng::seed_from_u64(2));
        let queue = TaskQueue::default();
        let mut generation = Generation::new(
            1,
            chromosomes(),
            &context,
            methods(FitnessSorter::Minimize),
        );

        let warnings = generation
            .prepare_candidates(&cache, context.job_id, &randomness, &queue, 2)
            .await?;
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("GALN_GEN0_C2"));

        let simulator = CountingSimulator {
            fail_for: Some("GALN_GEN0_C0".to_string()),
        };
        let warnings = generation.simulate(&simulator, &queue).await?;
        assert_eq!(warnings.len(), 1);

        let ranked: Vec<String> = generation
            .ranked_chromosomes()
            .iter()
            .map(|chromosome| chromosome.name().to_string())
            .collect();
        assert_eq!(ranked, vec!["GALN_GEN0_C3", "GALN_GEN0_C1"]);

        let tail: Vec<&str> = generation.candidates()[2..]
            .iter()
            .map(|candidate| candidate.chromosome().name())
            .collect();
        assert_eq!(tail, vec!["GALN_GEN0_C0", "GALN_GEN0_C2"]);

        // C0 holds a scenario but no result, so it is never exported.
        let exported: Vec<&str> = generation
            .best_scenarios(5)
            .iter()
            .map(|scenario| scenario.name.as_str())
            .collect();
        assert_eq!(exported.len(), 2);
        assert!(exported[0].ends_with("GALN_GEN0_C3"));
        assert!(exported[1].ends_with("GALN_GEN0_C1"));
        assert_eq!(generation.summaries().len(), 3);
        assert_eq!(generation.checkpoint().candidates.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn it_fails_with_too_few_valid_candidates() {
        let context = context();
        let cache = MemoryStore::new();
        let randomness = Randomness::new(StdRng::seed_from_u64(3));
        let mut generation = Generation::new(
            1,
            chromosomes(),
            &context,
            methods(FitnessSorter::Minimize),
        );

        let result = generation
            .prepare_candidates(&cache, context.job_id, &randomness, &TaskQueue::default(), 5)
            .await;
        assert!(matches!(
            result,
            Err(Error::InsufficientPopulation {
                valid: 4,
                required: 5
            })
        ));
    }

    #[tokio::test]
    async fn it_refuses_to_simulate_before_preparation() {
        let context = context();
        let mut generation = Generation::new(
            1,
            chromosomes(),
            &context,
            methods(FitnessSorter::Minimize),
        );
        let result = generation
            .simulate(&CountingSimulator { fail_for: None }, &TaskQueue::default())
            .await;
        assert!(matches!(result, Err(Error::UnexpectedState { .. })));
    }
}
