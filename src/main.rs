use std::error::Error;
use std::future::Future;

use chrono::Utc;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use smartcity_telemetry::channel::{BatchPublisher, EventSource, KafkaSink, KafkaSource};
use smartcity_telemetry::config::Config;
use smartcity_telemetry::demand::DemandModel;
use smartcity_telemetry::grid::CityGrid;
use smartcity_telemetry::stats::StatsSnapshot;
use smartcity_telemetry::traffic::{TrafficReading, TrafficSynthesizer};
use smartcity_telemetry::validator::TrafficValidator;
use smartcity_telemetry::weather::WeatherSynthesizer;

type TaskResult = Result<(), Box<dyn Error + Send + Sync>>;

// ===== Main Application =====

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = Config::from_env()?;
    let role = std::env::args().nth(1).unwrap_or_else(|| "all".to_string());

    println!("Smart-city telemetry starting");
    println!("  role: {role}");
    println!("  brokers: {}", config.kafka_brokers);
    println!(
        "  grid: {0}x{0} around ({1}, {2})",
        config.grid_size, config.city_center.0, config.city_center.1
    );
    println!("{}", "-".repeat(60));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    {
        let tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("Interrupt received, shutting down");
                let _ = tx.send(true);
            }
        });
    }

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    if matches!(role.as_str(), "traffic" | "all") {
        tasks.push(spawn_component(
            "traffic simulator",
            shutdown_tx.clone(),
            run_traffic_producer(config.clone(), shutdown_rx.clone()),
        ));
    }
    if matches!(role.as_str(), "weather" | "all") {
        tasks.push(spawn_component(
            "weather simulator",
            shutdown_tx.clone(),
            run_weather_producer(config.clone(), shutdown_rx.clone()),
        ));
    }
    if matches!(role.as_str(), "validate" | "all") {
        tasks.push(spawn_component(
            "validator",
            shutdown_tx.clone(),
            run_validator(config.clone(), shutdown_rx.clone()),
        ));
    }

    if tasks.is_empty() {
        return Err(
            format!("unknown role {role:?}; expected traffic, weather, validate or all").into(),
        );
    }

    join_all(tasks).await;
    println!("Smart-city telemetry stopped");
    Ok(())
}

/// Run a component to completion; its fatal error shuts the others down.
fn spawn_component(
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    task: impl Future<Output = TaskResult> + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = task.await {
            eprintln!("{name} failed: {err}");
            let _ = shutdown_tx.send(true);
        }
    })
}

fn seed_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

// ===== Traffic producer =====

async fn run_traffic_producer(config: Config, mut shutdown: watch::Receiver<bool>) -> TaskResult {
    let mut root = seed_rng(config.rng_seed);
    let grid = CityGrid::build(config.city_center, config.grid_size, &mut root)?;
    let mut demand = DemandModel::new(StdRng::seed_from_u64(root.next_u64()));
    let mut synthesizer = TrafficSynthesizer::new(StdRng::seed_from_u64(root.next_u64()));

    let sink = KafkaSink::connect(&config.kafka_brokers, &config.traffic_topic)?;
    let publisher = BatchPublisher::new(sink, config.max_batch_bytes);

    println!("Traffic simulator started");
    println!("  monitoring {} intersections", grid.intersections().len());
    println!("  publishing to {}", config.traffic_topic);
    println!("{}", "-".repeat(60));

    let mut interval = time::interval(config.traffic_interval);
    let mut iteration = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {}
        }

        iteration += 1;
        let now = Utc::now();
        let readings: Vec<TrafficReading> = grid
            .intersections()
            .iter()
            .map(|intersection| {
                let multiplier = demand.multiplier(now, intersection.district);
                synthesizer.synthesize(intersection, now, multiplier)
            })
            .collect();

        // A failed batch surfaces here after bounded retries; nothing is
        // silently dropped.
        let batches = publisher.publish(&readings).await?;
        print_traffic_summary(iteration, &readings, batches);
    }

    println!("Traffic simulator stopped");
    Ok(())
}

fn print_traffic_summary(iteration: u64, readings: &[TrafficReading], batches: usize) {
    let total_vehicles: u64 = readings.iter().map(|r| u64::from(r.vehicle_count)).sum();
    let avg_speed = readings.iter().map(|r| r.average_speed).sum::<f64>() / readings.len() as f64;
    let avg_occupancy =
        readings.iter().map(|r| r.occupancy_rate).sum::<f64>() / readings.len() as f64;

    println!("[{}] Iteration {iteration}", Utc::now().format("%H:%M:%S"));
    println!("  total vehicles: {total_vehicles}");
    println!("  avg speed: {avg_speed:.1} mph");
    println!("  avg occupancy: {:.1}%", avg_occupancy * 100.0);
    println!("  events sent: {} in {batches} batch(es)", readings.len());
    println!("{}", "-".repeat(60));
}

// ===== Weather producer =====

async fn run_weather_producer(config: Config, mut shutdown: watch::Receiver<bool>) -> TaskResult {
    let mut root = seed_rng(config.rng_seed);
    let mut synthesizer =
        WeatherSynthesizer::new(config.city_center, StdRng::seed_from_u64(root.next_u64()));

    let sink = KafkaSink::connect(&config.kafka_brokers, &config.weather_topic)?;
    let publisher = BatchPublisher::new(sink, config.max_batch_bytes);

    println!("Weather simulator started");
    println!("  publishing to {}", config.weather_topic);
    println!("{}", "-".repeat(60));

    let mut interval = time::interval(config.weather_interval);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {}
        }

        let reading = synthesizer.generate(Utc::now());
        publisher.publish(std::slice::from_ref(&reading)).await?;

        println!(
            "[{}] {}: {:.1} F",
            Utc::now().format("%H:%M:%S"),
            reading.condition.as_str().to_uppercase(),
            reading.temperature_f
        );
        println!("  precipitation: {:.2} in/hr", reading.precipitation_rate);
        println!("  visibility: {:.1} miles", reading.visibility_miles);
        println!("{}", "-".repeat(60));
    }

    println!("Weather simulator stopped");
    Ok(())
}

// ===== Validator =====

async fn run_validator(config: Config, mut shutdown: watch::Receiver<bool>) -> TaskResult {
    let mut source = KafkaSource::connect(
        &config.kafka_brokers,
        &config.consumer_group,
        &config.traffic_topic,
    )?;
    let mut validator = TrafficValidator::new();

    println!("Validator started");
    println!(
        "  consuming {} as group {}",
        config.traffic_topic, config.consumer_group
    );
    println!("{}", "-".repeat(60));

    loop {
        let payload = tokio::select! {
            _ = shutdown.changed() => break,
            received = source.recv() => received?,
        };

        let (valid, errors) = validator.validate(&payload);
        if !valid {
            log::warn!(
                "invalid message ({} violations): {}",
                errors.len(),
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            );
        }

        if validator.stats().total_messages() % config.stats_report_every == 0 {
            print_validation_summary(&validator.snapshot());
        }
    }

    print_validation_summary(&validator.snapshot());
    println!("Validator stopped");
    Ok(())
}

fn print_validation_summary(snapshot: &StatsSnapshot) {
    println!("Validation summary");
    println!(
        "  total: {}  valid: {}  invalid: {}",
        snapshot.total_messages, snapshot.valid_messages, snapshot.invalid_messages
    );
    println!(
        "  schema errors: {}  value errors: {}  null errors: {}",
        snapshot.schema_errors, snapshot.value_errors, snapshot.null_errors
    );
    println!(
        "  validity: {:.1}%  throughput: {:.2} msg/s",
        snapshot.validation_rate, snapshot.messages_per_second
    );
    println!("{}", "-".repeat(60));
}
