use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One discrete level of service available for a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelOfService {
    pub number_of_vehicles: u32,
    pub service_id: String,
}

impl LevelOfService {
    pub fn new(number_of_vehicles: u32, service_id: impl Into<String>) -> Self {
        Self {
            number_of_vehicles,
            service_id: service_id.into(),
        }
    }
}

/// Levels of service per line id, each ordered by increasing vehicle count.
pub type LineServices = BTreeMap<String, Vec<LevelOfService>>;

/// Restores the increasing vehicle count ordering expected by the vehicle assignment.
pub(crate) fn sort_levels(levels: &mut [LevelOfService]) {
    levels.sort_by_key(|level| level.number_of_vehicles);
}

/// Whether `service_id` belongs to one of the levels in `line_services`.
pub(crate) fn knows_service(line_services: &LineServices, service_id: &str) -> bool {
    line_services
        .values()
        .flatten()
        .any(|level| level.service_id == service_id)
}
