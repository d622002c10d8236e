mod candidate;
mod checkpoint;
mod chromosome;
mod crossover;
mod evaluator;
mod fitness;
mod level_of_service;
mod line;
mod mutagen;
mod options;
pub(crate) mod random;
mod scenario;
mod selector;

pub use candidate::{Candidate, CandidateError, CandidateSummary, LineSummary, RunContext};
pub use checkpoint::{Checkpoint, CheckpointCandidate};
pub use chromosome::Chromosome;
pub use crossover::KPointCrossover;
pub use evaluator::{
    Cancellation, CancellationFlag, NeverCancelled, PlanningError, ServiceConstraints,
    ServicePlanner, Simulator,
};
pub use fitness::{
    CandidateResult, FitnessSorter, MethodResult, RankedMethod, SimulationMethod,
    SimulationMethodConfig, UnsupportedMethodError, rank_product,
};
pub use level_of_service::{LevelOfService, LineServices};
pub use line::{Line, LineCollection};
pub use mutagen::Mutation;
pub use options::{
    EvolutionaryAlgorithmOptions, JobParameters, NetworkDesignParameters, OptionProblem,
    OptionsError,
};
pub use random::{RandomSource, Randomness, seeded};
pub use scenario::Scenario;
pub use selector::{SelectionError, Tournament};

pub(crate) use chromosome::{GenePool, count_active};
pub(crate) use level_of_service::{knows_service, sort_levels};
