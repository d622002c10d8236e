//! Run configuration.
//!
//! Everything a job needs to know before its first generation is bundled in
//! [`JobParameters`]: the algorithm knobs ([`EvolutionaryAlgorithmOptions`]),
//! the network design constraints ([`NetworkDesignParameters`]), the lines
//! that may be switched on or off and the simulation methods used to score
//! candidates. All of it deserializes from camelCase JSON with the defaults
//! below filled in for missing fields.
//!
//! # Validation
//!
//! [`JobParameters::validate`] checks every field and reports all problems at
//! once, so a caller fixing a configuration sees the full list rather than
//! one problem per attempt.
//!
//! ```rust
//! use durable_network_ga::models::EvolutionaryAlgorithmOptions;
//!
//! let options = EvolutionaryAlgorithmOptions {
//!     number_of_elites: 30,
//!     ..Default::default()
//! };
//! assert!(options.validate().is_err());
//! ```

use crate::models::{Line, SimulationMethodConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;

/// Genetic algorithm knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvolutionaryAlgorithmOptions {
    pub population_size_min: usize,
    pub population_size_max: usize,
    /// Best chromosomes copied verbatim into the next generation.
    pub number_of_elites: usize,
    /// Fresh random chromosomes injected into each reproduced generation.
    pub number_of_randoms: usize,
    pub crossover_number_of_cuts: usize,
    pub crossover_probability: f64,
    pub mutation_probability: f64,
    pub tournament_size: usize,
    pub tournament_probability: f64,
    pub number_of_generations: u32,
    /// Shuffle unprotected gene positions before reproduction.
    pub shuffle_genes: bool,
    /// How many of the final generations export their best scenarios.
    pub keep_generations: u32,
    /// How many scenarios each of those generations exports.
    pub keep_candidates: usize,
}

impl Default for EvolutionaryAlgorithmOptions {
    fn default() -> Self {
        Self {
            population_size_min: 20,
            population_size_max: 20,
            number_of_elites: 2,
            number_of_randoms: 0,
            crossover_number_of_cuts: 1,
            crossover_probability: 0.8,
            mutation_probability: 0.08,
            tournament_size: 10,
            tournament_probability: 0.7,
            number_of_generations: 100,
            shuffle_genes: true,
            keep_generations: 1,
            keep_candidates: 1,
        }
    }
}

/// A single configuration problem found by validation.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionProblem {
    MustBePositive(&'static str),
    ProbabilityOutOfRange { field: &'static str, value: f64 },
    MinExceedsMax { min: &'static str, max: &'static str },
    TooLarge { field: &'static str, limit: &'static str },
    NoSimulationMethod,
    UnknownKeptLine(String),
    /// `numberOfLinesMin` asks for more lines than the job simulates.
    NotEnoughLines { min: usize, available: usize },
    /// `numberOfLinesMax` is below the lines that are always active.
    TooManyKeptLines { max: usize, kept: usize },
}

impl fmt::Display for OptionProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionProblem::MustBePositive(field) => write!(f, "{field} must be greater than 0"),
            OptionProblem::ProbabilityOutOfRange { field, value } => {
                write!(f, "{field} must be between 0.0 and 1.0, got {value}")
            }
            OptionProblem::MinExceedsMax { min, max } => {
                write!(f, "{min} must not exceed {max}")
            }
            OptionProblem::TooLarge { field, limit } => {
                write!(f, "{field} must not exceed {limit}")
            }
            OptionProblem::NoSimulationMethod => {
                write!(f, "at least one simulation method is required")
            }
            OptionProblem::UnknownKeptLine(id) => {
                write!(f, "line to keep {id} is not a simulated line")
            }
            OptionProblem::NotEnoughLines { min, available } => write!(
                f,
                "numberOfLinesMin is {min} but only {available} lines are simulated"
            ),
            OptionProblem::TooManyKeptLines { max, kept } => write!(
                f,
                "numberOfLinesMax is {max} but {kept} lines to keep are always active"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid options: {}", format_problems(.0))]
pub struct OptionsError(pub Vec<OptionProblem>);

fn format_problems(problems: &[OptionProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_positive(problems: &mut Vec<OptionProblem>, field: &'static str, value: usize) {
    if value == 0 {
        problems.push(OptionProblem::MustBePositive(field));
    }
}

fn check_probability(problems: &mut Vec<OptionProblem>, field: &'static str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        problems.push(OptionProblem::ProbabilityOutOfRange { field, value });
    }
}

impl EvolutionaryAlgorithmOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        let mut problems = Vec::new();
        self.collect_problems(&mut problems);

        if problems.is_empty() {
            Ok(())
        } else {
            Err(OptionsError(problems))
        }
    }

    fn collect_problems(&self, problems: &mut Vec<OptionProblem>) {
        check_positive(problems, "populationSizeMin", self.population_size_min);
        check_positive(problems, "populationSizeMax", self.population_size_max);
        check_positive(problems, "numberOfElites", self.number_of_elites);
        check_positive(problems, "crossoverNumberOfCuts", self.crossover_number_of_cuts);
        check_positive(problems, "tournamentSize", self.tournament_size);

        check_probability(problems, "crossoverProbability", self.crossover_probability);
        check_probability(problems, "mutationProbability", self.mutation_probability);
        check_probability(problems, "tournamentProbability", self.tournament_probability);

        if self.population_size_min > self.population_size_max {
            problems.push(OptionProblem::MinExceedsMax {
                min: "populationSizeMin",
                max: "populationSizeMax",
            });
        }
        if self.keep_candidates > self.population_size_min {
            problems.push(OptionProblem::TooLarge {
                field: "keepCandidates",
                limit: "populationSizeMin",
            });
        }
        if self.keep_generations > self.number_of_generations {
            problems.push(OptionProblem::TooLarge {
                field: "keepGenerations",
                limit: "numberOfGenerations",
            });
        }
        if self.number_of_elites + self.number_of_randoms > self.population_size_min {
            problems.push(OptionProblem::TooLarge {
                field: "numberOfElites + numberOfRandoms",
                limit: "populationSizeMin",
            });
        }
    }
}

/// Structural constraints of the network being designed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDesignParameters {
    #[serde(default)]
    pub number_of_lines_min: Option<usize>,
    #[serde(default)]
    pub number_of_lines_max: Option<usize>,
    /// Vehicle budget shared by the active lines of a candidate.
    pub nb_of_vehicles: u32,
    #[serde(default)]
    pub lines_to_keep: Vec<String>,
    /// Services added to every scenario without being part of the search.
    #[serde(default)]
    pub non_simulated_services: Vec<String>,
    /// Headway bounds in minutes handed to the service planner.
    #[serde(default = "default_min_time_between_passages")]
    pub min_time_between_passages: u32,
    #[serde(default = "default_max_time_between_passages")]
    pub max_time_between_passages: u32,
}

fn default_min_time_between_passages() -> u32 {
    5
}

fn default_max_time_between_passages() -> u32 {
    60
}

impl NetworkDesignParameters {
    pub fn new(nb_of_vehicles: u32) -> Self {
        Self {
            number_of_lines_min: None,
            number_of_lines_max: None,
            nb_of_vehicles,
            lines_to_keep: Vec::new(),
            non_simulated_services: Vec::new(),
            min_time_between_passages: default_min_time_between_passages(),
            max_time_between_passages: default_max_time_between_passages(),
        }
    }

    fn collect_problems(&self, lines: &[Line], problems: &mut Vec<OptionProblem>) {
        check_positive(problems, "nbOfVehicles", self.nb_of_vehicles as usize);

        if let (Some(min), Some(max)) = (self.number_of_lines_min, self.number_of_lines_max) {
            if min > max {
                problems.push(OptionProblem::MinExceedsMax {
                    min: "numberOfLinesMin",
                    max: "numberOfLinesMax",
                });
            }
        }
        if self.min_time_between_passages > self.max_time_between_passages {
            problems.push(OptionProblem::MinExceedsMax {
                min: "minTimeBetweenPassages",
                max: "maxTimeBetweenPassages",
            });
        }
        for id in &self.lines_to_keep {
            if !lines.iter().any(|line| &line.id == id) {
                problems.push(OptionProblem::UnknownKeptLine(id.clone()));
            }
        }

        if let Some(min) = self.number_of_lines_min {
            if min > lines.len() {
                problems.push(OptionProblem::NotEnoughLines {
                    min,
                    available: lines.len(),
                });
            }
        }
        let kept = lines
            .iter()
            .filter(|line| self.lines_to_keep.contains(&line.id))
            .count();
        if let Some(max) = self.number_of_lines_max {
            if max < kept {
                problems.push(OptionProblem::TooManyKeptLines { max, kept });
            }
        }
    }
}

/// Everything a job needs to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobParameters {
    #[serde(default)]
    pub algorithm: EvolutionaryAlgorithmOptions,
    pub network: NetworkDesignParameters,
    /// Lines the search may switch on or off.
    pub lines: Vec<Line>,
    pub simulation_methods: Vec<SimulationMethodConfig>,
    /// Seeds the run generator; unseeded runs draw from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl JobParameters {
    #[instrument(level = "debug", skip(self), fields(lines = self.lines.len(), methods = self.simulation_methods.len()))]
    pub fn validate(&self) -> Result<(), OptionsError> {
        let mut problems = Vec::new();
        self.algorithm.collect_problems(&mut problems);
        self.network.collect_problems(&self.lines, &mut problems);

        if self.simulation_methods.is_empty() {
            problems.push(OptionProblem::NoSimulationMethod);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(OptionsError(problems))
        }
    }
}
