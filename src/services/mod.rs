pub mod generation;
pub mod optimization;
pub mod population;
pub mod queue;
