use crate::models::{CandidateError, OptionsError, UnsupportedMethodError};
use crate::repositories;
use crate::services::{generation, population};

/// Errors that end an optimization run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid options: {0}")]
    InvalidOptions(#[from] OptionsError),
    #[error("Unsupported simulation method: {0}")]
    UnsupportedSimulationMethod(String),
    #[error("Population generation error: impossible to generate a unique candidate after {0} tentatives")]
    PopulationGeneration(usize),
    #[error("Reproduction error: {0}")]
    Reproduction(population::Error),
    #[error(
        "Insufficient population: {valid} candidates have a valid scenario, {required} required"
    )]
    InsufficientPopulation { valid: usize, required: usize },
    #[error("Generation error: {0}")]
    Generation(generation::Error),
    #[error("Resume integrity error: {0}")]
    ResumeIntegrity(String),
    #[error("Path not properly configured for line {line}")]
    PathNotConfigured { line: String },
    #[error("Too few trips were generated for line {line} with {vehicles} vehicles")]
    TooFewTrips { line: String, vehicles: u32 },
    #[error("Service preparation failed for line {line}: {source}")]
    ServicePreparation { line: String, source: anyhow::Error },
    #[error("Candidate error: {0}")]
    CandidateError(#[from] CandidateError),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] repositories::Error),
}

impl From<UnsupportedMethodError> for Error {
    fn from(error: UnsupportedMethodError) -> Self {
        Error::UnsupportedSimulationMethod(error.0)
    }
}

impl From<population::Error> for Error {
    fn from(error: population::Error) -> Self {
        match error {
            population::Error::PopulationGeneration(tentatives) => {
                Error::PopulationGeneration(tentatives)
            }
            other => Error::Reproduction(other),
        }
    }
}

impl From<generation::Error> for Error {
    fn from(error: generation::Error) -> Self {
        match error {
            generation::Error::InsufficientPopulation { valid, required } => {
                Error::InsufficientPopulation { valid, required }
            }
            generation::Error::CacheError(error) => Error::RepositoryError(error),
            other => Error::Generation(other),
        }
    }
}
