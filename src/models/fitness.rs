use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::instrument;

/// Direction in which a simulation method's fitness improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FitnessSorter {
    Minimize,
    Maximize,
}

impl FitnessSorter {
    /// Orders `a` before `b` when `a` is the better fitness.
    pub fn compare(&self, a: f64, b: f64) -> Ordering {
        match self {
            FitnessSorter::Minimize => a.total_cmp(&b),
            FitnessSorter::Maximize => b.total_cmp(&a),
        }
    }
}

/// The simulation methods a run can score candidates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulationMethod {
    OdTrips,
    AccessibilityMap,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unsupported simulation method: {0}")]
pub struct UnsupportedMethodError(pub String);

impl SimulationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            SimulationMethod::OdTrips => "OdTrips",
            SimulationMethod::AccessibilityMap => "AccessibilityMap",
        }
    }

    pub fn parse(name: &str) -> Result<Self, UnsupportedMethodError> {
        match name {
            "OdTrips" => Ok(SimulationMethod::OdTrips),
            "AccessibilityMap" => Ok(SimulationMethod::AccessibilityMap),
            other => Err(UnsupportedMethodError(other.to_string())),
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A simulation method as configured on a job, before name resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationMethodConfig {
    pub method: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub fitness_sorter: FitnessSorter,
}

impl SimulationMethodConfig {
    pub fn new(method: impl Into<String>, fitness_sorter: FitnessSorter) -> Self {
        Self {
            method: method.into(),
            weight: default_weight(),
            fitness_sorter,
        }
    }

    pub fn resolve(&self) -> Result<RankedMethod, UnsupportedMethodError> {
        Ok(RankedMethod {
            method: SimulationMethod::parse(&self.method)?,
            weight: self.weight,
            sorter: self.fitness_sorter,
        })
    }
}

/// A resolved simulation method with its ranking parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedMethod {
    pub method: SimulationMethod,
    pub weight: f64,
    pub sorter: FitnessSorter,
}

/// What the simulation oracle returned for one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    pub fitness: f64,
    #[serde(default)]
    pub results: serde_json::Value,
}

impl MethodResult {
    pub fn new(fitness: f64) -> Self {
        Self {
            fitness,
            results: serde_json::Value::Null,
        }
    }
}

/// Simulation outcome of a candidate.
///
/// `total_fitness` stays `None` until the whole generation has been ranked.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    pub total_fitness: Option<f64>,
    pub results: BTreeMap<String, MethodResult>,
}

/// Rank product of every candidate across `methods`.
///
/// `fitness[c][m]` is the fitness of candidate `c` for method `m`. Per method,
/// candidates are stably sorted best-first and ranked from 1; equal fitness
/// shares the rank of the first candidate holding it. A candidate's total is
/// the product of `rank ^ weight` over methods, so lower is better.
#[instrument(level = "debug", skip_all, fields(candidates = fitness.len(), methods = methods.len()))]
pub fn rank_product(methods: &[RankedMethod], fitness: &[Vec<f64>]) -> Vec<f64> {
    let mut totals = vec![1.0; fitness.len()];

    for (m, method) in methods.iter().enumerate() {
        let mut order: Vec<usize> = (0..fitness.len()).collect();
        order.sort_by(|&a, &b| method.sorter.compare(fitness[a][m], fitness[b][m]));

        let mut previous: Option<(f64, usize)> = None;
        for (position, &candidate) in order.iter().enumerate() {
            let value = fitness[candidate][m];
            let rank = match previous {
                Some((previous_value, previous_rank)) if previous_value == value => previous_rank,
                _ => position,
            };
            totals[candidate] *= ((rank + 1) as f64).powf(method.weight);
            previous = Some((value, rank));
        }
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(method: SimulationMethod, sorter: FitnessSorter) -> RankedMethod {
        RankedMethod {
            method,
            weight: 1.0,
            sorter,
        }
    }

    #[test]
    fn it_shares_ranks_between_equal_fitness() {
        let methods = [method(SimulationMethod::OdTrips, FitnessSorter::Minimize)];
        let fitness = vec![vec![10.0], vec![5.0], vec![5.0], vec![1.0]];

        let totals = rank_product(&methods, &fitness);
        assert_eq!(totals, vec![4.0, 2.0, 2.0, 1.0]);

        let mut order: Vec<usize> = (0..totals.len()).collect();
        order.sort_by(|&a, &b| totals[a].total_cmp(&totals[b]));
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn it_ranks_maximized_methods_in_descending_order() {
        let methods = [method(SimulationMethod::AccessibilityMap, FitnessSorter::Maximize)];
        let fitness = vec![vec![0.2], vec![0.9], vec![0.5]];

        assert_eq!(rank_product(&methods, &fitness), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn it_multiplies_weighted_ranks_across_methods() {
        let methods = [
            method(SimulationMethod::OdTrips, FitnessSorter::Minimize),
            RankedMethod {
                weight: 2.0,
                ..method(SimulationMethod::AccessibilityMap, FitnessSorter::Maximize)
            },
        ];
        // Ranks: method one [1, 2], method two [2, 1].
        let fitness = vec![vec![1.0, 0.1], vec![2.0, 0.3]];

        assert_eq!(rank_product(&methods, &fitness), vec![4.0, 2.0]);
    }

    #[test]
    fn it_rejects_unknown_methods() {
        let config = SimulationMethodConfig::new("Teleportation", FitnessSorter::Minimize);
        assert_eq!(
            config.resolve().unwrap_err(),
            UnsupportedMethodError("Teleportation".to_string())
        );
        assert_eq!(
            SimulationMethod::parse(SimulationMethod::OdTrips.name()),
            Ok(SimulationMethod::OdTrips)
        );
    }
}
