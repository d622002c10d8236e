use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The set of services a candidate runs, as handed to the simulation oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: Uuid,
    pub name: String,
    pub services: Vec<String>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, services: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            services,
        }
    }
}
