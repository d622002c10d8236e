use anyhow::Result;
use durable_network_ga::{
    Configuration, RunOutcome, bootstrap_optimizer,
    models::{
        CancellationFlag, EvolutionaryAlgorithmOptions, FitnessSorter, JobParameters,
        LevelOfService, Line, MethodResult, NetworkDesignParameters, PlanningError, Scenario,
        ServiceConstraints, ServicePlanner, SimulationMethod, SimulationMethodConfig, Simulator,
    },
};
use futures::future::BoxFuture;
use std::{env, sync::Arc};
use uuid::Uuid;

/// Offers every line one level of service per headway between the bounds,
/// in steps of five minutes, using a 60 minute round trip.
struct HeadwayPlanner;

impl ServicePlanner for HeadwayPlanner {
    fn prepare_services_for_line<'a>(
        &'a self,
        line: &'a Line,
        constraints: &'a ServiceConstraints,
    ) -> BoxFuture<'a, Result<Vec<LevelOfService>, PlanningError>> {
        Box::pin(async move {
            let mut levels: Vec<LevelOfService> = (constraints.min_time_between_passages
                ..=constraints.max_time_between_passages)
                .step_by(5)
                .map(|headway| 60_u32.div_ceil(headway.max(1)))
                .filter(|&vehicles| vehicles <= constraints.nb_of_vehicles)
                .map(|vehicles| LevelOfService::new(vehicles, format!("{}_{vehicles}veh", line.id)))
                .collect();
            levels.sort_by_key(|level| level.number_of_vehicles);
            levels.dedup_by_key(|level| level.number_of_vehicles);

            if levels.is_empty() {
                return Err(PlanningError::TooFewTrips {
                    line: line.shortname.clone(),
                    vehicles: constraints.nb_of_vehicles,
                });
            }
            Ok(levels)
        })
    }
}

/// Pretends that ridership grows with the square root of the vehicles
/// assigned to each line, weighted by the line number.
struct RidershipSimulator;

impl Simulator for RidershipSimulator {
    fn simulate<'a>(
        &'a self,
        _method: SimulationMethod,
        scenario: &'a Scenario,
    ) -> BoxFuture<'a, Result<MethodResult, anyhow::Error>> {
        Box::pin(async move {
            let ridership: f64 = scenario
                .services
                .iter()
                .filter_map(|service| service.strip_prefix("line-"))
                .filter_map(|rest| rest.split_once('_'))
                .filter_map(|(line, vehicles)| {
                    let line = line.parse::<f64>().ok()?;
                    let vehicles = vehicles.trim_end_matches("veh").parse::<f64>().ok()?;
                    Some((line + 1.0).ln() * vehicles.sqrt())
                })
                .sum();
            Ok(MethodResult::new(ridership))
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Keep the job data between runs when a directory is given.
    let temporary = tempfile::tempdir()?;
    let data_directory = env::var("NETWORK_GA_DATA_DIR")
        .map(Into::into)
        .unwrap_or_else(|_| temporary.path().to_path_buf());

    let parameters = JobParameters {
        algorithm: EvolutionaryAlgorithmOptions {
            population_size_min: 12,
            population_size_max: 16,
            number_of_generations: 20,
            tournament_size: 4,
            keep_candidates: 3,
            ..Default::default()
        },
        network: NetworkDesignParameters {
            number_of_lines_min: Some(4),
            number_of_lines_max: Some(10),
            lines_to_keep: vec!["line-0".to_string()],
            ..NetworkDesignParameters::new(60)
        },
        lines: (0..14)
            .map(|index| Line::new(format!("line-{index}"), format!("{}", 100 + index)))
            .collect(),
        simulation_methods: vec![SimulationMethodConfig::new(
            "OdTrips",
            FitnessSorter::Maximize,
        )],
        seed: Some(42),
    };

    let cancellation = CancellationFlag::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let service = bootstrap_optimizer(
        Configuration::new(data_directory),
        Uuid::now_v7(),
        parameters,
        Arc::new(RidershipSimulator),
        Arc::new(HeadwayPlanner),
    )
    .await?
    .with_cancellation(Arc::new(cancellation))
    .build()?;

    match service.run().await? {
        RunOutcome::Completed => println!("Job {} completed", service.job_id()),
        RunOutcome::Paused { next_generation } => {
            println!("Job {} paused before generation {next_generation}", service.job_id())
        }
        RunOutcome::Failed { errors } => println!("Job {} failed: {errors:?}", service.job_id()),
    }

    Ok(())
}
