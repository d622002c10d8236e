#![allow(dead_code)]

use durable_network_ga::models::{
    EvolutionaryAlgorithmOptions, FitnessSorter, JobParameters, LevelOfService, Line,
    MethodResult, NetworkDesignParameters, PlanningError, Scenario, ServiceConstraints,
    ServicePlanner, SimulationMethod, SimulationMethodConfig, Simulator,
};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Six lines, a budget of eight vehicles and two to four active lines.
pub fn parameters(seed: u64) -> JobParameters {
    JobParameters {
        algorithm: EvolutionaryAlgorithmOptions {
            population_size_min: 4,
            population_size_max: 4,
            number_of_elites: 1,
            number_of_randoms: 0,
            tournament_size: 2,
            number_of_generations: 3,
            keep_generations: 1,
            keep_candidates: 2,
            ..Default::default()
        },
        network: NetworkDesignParameters {
            number_of_lines_min: Some(2),
            number_of_lines_max: Some(4),
            non_simulated_services: vec!["metro".to_string()],
            ..NetworkDesignParameters::new(8)
        },
        lines: (0..6)
            .map(|index| Line::new(format!("line-{index}"), format!("{}", index + 10)))
            .collect(),
        simulation_methods: vec![SimulationMethodConfig::new(
            "OdTrips",
            FitnessSorter::Maximize,
        )],
        seed: Some(seed),
    }
}

/// One level of service per vehicle count from 1 to 10.
pub struct StepPlanner;

impl ServicePlanner for StepPlanner {
    fn prepare_services_for_line<'a>(
        &'a self,
        line: &'a Line,
        _constraints: &'a ServiceConstraints,
    ) -> BoxFuture<'a, Result<Vec<LevelOfService>, PlanningError>> {
        Box::pin(async move {
            Ok((1..=10)
                .rev()
                .map(|vehicles| LevelOfService::new(vehicles, format!("{}_{vehicles}", line.id)))
                .collect())
        })
    }
}

/// Refuses every line whose path is missing.
pub struct UnroutablePlanner;

impl ServicePlanner for UnroutablePlanner {
    fn prepare_services_for_line<'a>(
        &'a self,
        line: &'a Line,
        _constraints: &'a ServiceConstraints,
    ) -> BoxFuture<'a, Result<Vec<LevelOfService>, PlanningError>> {
        Box::pin(async move {
            Err(PlanningError::PathNotConfigured {
                line: line.shortname.clone(),
            })
        })
    }
}

/// Scores a scenario by the number of vehicles of its even lines and
/// remembers every scenario it was asked to simulate.
#[derive(Default)]
pub struct RecordingSimulator {
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingSimulator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Scenario names and services simulated for a chromosome name prefix, sorted.
    pub fn calls_for(&self, generation_prefix: &str) -> Vec<(String, Vec<String>)> {
        let calls = self.calls.lock().unwrap();
        let mut matching: Vec<_> = calls
            .iter()
            .filter(|(name, _)| name.contains(generation_prefix))
            .cloned()
            .collect();
        matching.sort();
        matching
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Simulator for RecordingSimulator {
    fn simulate<'a>(
        &'a self,
        _method: SimulationMethod,
        scenario: &'a Scenario,
    ) -> BoxFuture<'a, Result<MethodResult, anyhow::Error>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push((scenario.name.clone(), scenario.services.clone()));

            let fitness: u32 = scenario
                .services
                .iter()
                .filter_map(|service| service.strip_prefix("line-"))
                .filter_map(|rest| rest.split_once('_'))
                .filter(|(line, _)| line.parse::<u32>().is_ok_and(|line| line % 2 == 0))
                .filter_map(|(_, vehicles)| vehicles.parse::<u32>().ok())
                .sum();
            Ok(MethodResult::new(f64::from(fitness)))
        })
    }
}
