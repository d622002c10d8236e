use crate::models::random::{RandomSource, pick_weighted};
use crate::models::{
    CandidateResult, Chromosome, LevelOfService, Line, LineCollection, LineServices, RankedMethod,
    Scenario, Simulator,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Share of the vehicle budget below which an assignment is rejected.
const USED_VEHICLES_THRESHOLD: f64 = 0.75;

/// Assignment tries per candidate before giving up on a line combination.
const MAX_ASSIGNMENT_ATTEMPTS: usize = 5;

/// Read-only data shared by every candidate of a run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub job_id: Uuid,
    pub lines: LineCollection,
    pub line_services: LineServices,
    pub nb_of_vehicles: u32,
    pub non_simulated_services: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CandidateError {
    #[error("Impossible to assign minimal level of service for this combination")]
    ImpossibleMinimalService,
    #[error("Too few vehicles were assigned for this combination: {used} of {available}")]
    TooFewVehiclesAssigned { used: u32, available: u32 },
    #[error("After {0} attempts, it was not possible to assign levels of service to this line combination")]
    AssignmentAttemptsExhausted(usize),
    #[error("Candidate {0} has no scenario")]
    MissingScenario(String),
    #[error("No level of service for line {0}")]
    MissingLevelOfService(String),
    #[error("Line {0} is supposed to be active in scenario, but there is no service for it")]
    NoServiceForLine(String),
    #[error("Simulation failed: {0}")]
    Simulation(anyhow::Error),
}

/// Per-line part of a candidate summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSummary {
    pub shortname: String,
    pub number_of_vehicles: u32,
}

/// Storage-ready description of a candidate and its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSummary {
    pub name: String,
    pub scenario_id: Uuid,
    pub lines: BTreeMap<String, LineSummary>,
    pub number_of_lines: usize,
    pub number_of_vehicles: u32,
    pub max_number_of_vehicles: u32,
    pub result: Option<CandidateResult>,
}

/// One member of a generation.
#[derive(Debug, Clone)]
pub struct Candidate {
    chromosome: Chromosome,
    context: Arc<RunContext>,
    scenario: Option<Scenario>,
    result: Option<CandidateResult>,
}

impl Candidate {
    pub fn new(chromosome: Chromosome, context: Arc<RunContext>) -> Self {
        Self {
            chromosome,
            context,
            scenario: None,
            result: None,
        }
    }

    /// Rehydrates a candidate whose scenario was prepared by an earlier process.
    pub fn with_scenario(
        chromosome: Chromosome,
        context: Arc<RunContext>,
        scenario: Option<Scenario>,
    ) -> Self {
        Self {
            chromosome,
            context,
            scenario,
            result: None,
        }
    }

    pub fn chromosome(&self) -> &Chromosome {
        &self.chromosome
    }

    pub fn scenario(&self) -> Option<&Scenario> {
        self.scenario.as_ref()
    }

    pub fn result(&self) -> Option<&CandidateResult> {
        self.result.as_ref()
    }

    pub(crate) fn result_mut(&mut self) -> Option<&mut CandidateResult> {
        self.result.as_mut()
    }

    /// Assigns a level of service to every active line and builds the scenario.
    #[instrument(level = "debug", skip(self, rng), fields(candidate = %self.chromosome.name()))]
    pub fn prepare_scenario(
        &mut self,
        rng: &mut dyn RandomSource,
    ) -> Result<&Scenario, CandidateError> {
        let active = self.active_lines()?;
        let mut services = self.assign_services(rng, &active)?;
        services.extend(self.context.non_simulated_services.iter().cloned());

        let job_prefix: String = self.context.job_id.to_string().chars().take(8).collect();
        let name = format!(
            "SimRun_{}veh{}lines_{}_{}",
            self.context.nb_of_vehicles,
            active.len(),
            job_prefix,
            self.chromosome.name()
        );

        Ok(self.scenario.insert(Scenario::new(name, services)))
    }

    fn active_lines(&self) -> Result<Vec<(&Line, &[LevelOfService])>, CandidateError> {
        self.chromosome
            .active_indices()
            .map(|index| {
                let line = self
                    .context
                    .lines
                    .get(index)
                    .ok_or_else(|| CandidateError::MissingLevelOfService(format!("#{index}")))?;
                match self.context.line_services.get(&line.id) {
                    Some(levels) if !levels.is_empty() => Ok((line, levels.as_slice())),
                    _ => Err(CandidateError::MissingLevelOfService(line.id.clone())),
                }
            })
            .collect()
    }

    fn assign_services(
        &self,
        rng: &mut dyn RandomSource,
        active: &[(&Line, &[LevelOfService])],
    ) -> Result<Vec<String>, CandidateError> {
        for attempt in 1..=MAX_ASSIGNMENT_ATTEMPTS {
            match self.assign_number_of_vehicles(rng, active) {
                Ok(services) => return Ok(services),
                Err(CandidateError::ImpossibleMinimalService) => {
                    return Err(CandidateError::ImpossibleMinimalService);
                }
                Err(error) => debug!(attempt, %error, "vehicle assignment failed"),
            }
        }

        Err(CandidateError::AssignmentAttemptsExhausted(
            MAX_ASSIGNMENT_ATTEMPTS,
        ))
    }

    /// Starts every line at its lowest level, then raises randomly chosen
    /// lines one level at a time while the budget allows.
    fn assign_number_of_vehicles(
        &self,
        rng: &mut dyn RandomSource,
        active: &[(&Line, &[LevelOfService])],
    ) -> Result<Vec<String>, CandidateError> {
        let budget = self.context.nb_of_vehicles;
        let mut level_indexes = vec![0usize; active.len()];
        let mut used: u32 = active
            .iter()
            .map(|(_, levels)| levels[0].number_of_vehicles)
            .sum();

        if used > budget {
            return Err(CandidateError::ImpossibleMinimalService);
        }

        let weights: Vec<f64> = active
            .iter()
            .map(|(line, _)| line.assignment_weight())
            .collect();
        let total_weight: f64 = weights.iter().sum();
        let max_failed_attempts = active.len() * 2;
        let mut failed_attempts = 0;

        while used < budget && failed_attempts < max_failed_attempts {
            let pick = pick_weighted(&weights, rng.float(), total_weight);
            let levels = active[pick].1;
            let next = level_indexes[pick] + 1;

            let Some(next_level) = levels.get(next) else {
                failed_attempts += 1;
                continue;
            };
            let added = next_level
                .number_of_vehicles
                .saturating_sub(levels[next - 1].number_of_vehicles);
            if used + added > budget {
                failed_attempts += 1;
                continue;
            }

            used += added;
            level_indexes[pick] = next;
        }

        if f64::from(used) / f64::from(budget.max(1)) < USED_VEHICLES_THRESHOLD {
            return Err(CandidateError::TooFewVehiclesAssigned {
                used,
                available: budget,
            });
        }

        Ok(active
            .iter()
            .zip(level_indexes)
            .map(|((_, levels), index)| levels[index].service_id.clone())
            .collect())
    }

    /// Runs every method against the prepared scenario.
    ///
    /// Any failing method leaves the candidate without a result.
    #[instrument(level = "debug", skip(self, simulator, methods), fields(candidate = %self.chromosome.name()))]
    pub async fn simulate(
        &mut self,
        simulator: &dyn Simulator,
        methods: &[RankedMethod],
    ) -> Result<&CandidateResult, CandidateError> {
        let scenario = self
            .scenario
            .as_ref()
            .ok_or_else(|| CandidateError::MissingScenario(self.chromosome.name().to_string()))?;

        let mut results = BTreeMap::new();
        for ranked in methods {
            let result = simulator
                .simulate(ranked.method, scenario)
                .await
                .map_err(CandidateError::Simulation)?;
            results.insert(ranked.method.name().to_string(), result);
        }

        Ok(self.result.insert(CandidateResult {
            total_fitness: None,
            results,
        }))
    }

    /// Summarizes the candidate's network and result for storage.
    pub fn serialize(&self) -> Result<CandidateSummary, CandidateError> {
        let scenario = self
            .scenario
            .as_ref()
            .ok_or_else(|| CandidateError::MissingScenario(self.chromosome.name().to_string()))?;

        let mut lines = BTreeMap::new();
        let mut number_of_vehicles = 0;
        for (line, levels) in self.active_lines()? {
            let level = levels
                .iter()
                .find(|level| scenario.services.contains(&level.service_id))
                .ok_or_else(|| CandidateError::NoServiceForLine(line.shortname.clone()))?;

            number_of_vehicles += level.number_of_vehicles;
            lines.insert(
                line.id.clone(),
                LineSummary {
                    shortname: line.shortname.clone(),
                    number_of_vehicles: level.number_of_vehicles,
                },
            );
        }

        Ok(CandidateSummary {
            name: self.chromosome.name().to_string(),
            scenario_id: scenario.id,
            number_of_lines: lines.len(),
            lines,
            number_of_vehicles,
            max_number_of_vehicles: self.context.nb_of_vehicles,
            result: self.result.clone(),
        })
    }
}
