pub mod bootstrap;
pub mod models;
pub mod repositories;
pub mod services;

pub use bootstrap::{Configuration, bootstrap_optimizer};
pub use services::optimization::{Error, RunOutcome, Service, ServiceBuilder};
