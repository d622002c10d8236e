mod errors;
mod service;
mod service_builder;

pub use errors::Error;
pub use service::{RunOutcome, Service};
pub use service_builder::ServiceBuilder;
