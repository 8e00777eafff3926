// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! IMU Bridge demo
//!
//! Runs the sensor manager against the simulated platform and prints every
//! delivered event, either as a log line or as JSON.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use imu_bridge::{Config, SensorEvent, SensorManager, SimulatedPlatform, NAME, VERSION};

/// IMU Bridge - motion sensor bridge demo
#[derive(Parser, Debug)]
#[command(name = "imu-bridge")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Stream simulated motion sensor events through the bridge")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Stop after this many seconds (runs until Ctrl+C otherwise)
    #[arg(long)]
    duration: Option<u64>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create configuration
    let config_path = args.config.unwrap_or_else(Config::default_path);
    let config = Config::load_or_create(&config_path)?;

    // Initialize logging
    let log_level = if args.trace {
        "trace".to_string()
    } else if args.debug {
        "debug".to_string()
    } else {
        config.log_level.clone()
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(&log_level))
        .with_target(false)
        .with_thread_names(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{} v{}", NAME, VERSION);
    info!("Configuration loaded from {:?}", config_path);

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    rt.block_on(run(config, args.duration, args.json))
}

/// Stream events until Ctrl+C or the optional deadline
async fn run(config: Config, duration: Option<u64>, json: bool) -> Result<()> {
    let platform = SimulatedPlatform::new(&config.simulator);
    let mut manager = SensorManager::new(platform, config.event_loop.clone());
    manager.initialize()?;

    for index in 0..manager.sensor_count() {
        let sensor = manager.sensor_info(index);
        info!("  [{}] {} (type {})", index, sensor.name, sensor.type_code());
    }

    manager.set_event_callback(Some(Box::new(move |event: &SensorEvent| {
        if json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to encode event: {}", e),
            }
        } else {
            info!(
                "{:<40} x={:>9.4} y={:>9.4} z={:>9.4} {}",
                event.name,
                event.values.x,
                event.values.y,
                event.values.z,
                event.sensor_type.unit()
            );
        }
    })));
    manager.start_listening();

    info!("Listening, press Ctrl+C to stop");

    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut report = tokio::time::interval(Duration::from_secs(5));
    report.tick().await;

    // Manual-loop configurations are driven from here
    let mut pump = tokio::time::interval(config.event_loop.poll_timeout().max(Duration::from_millis(10)));

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Shutdown signal received");
                break;
            }
            _ = &mut deadline => {
                info!("Run duration elapsed");
                break;
            }
            _ = report.tick() => {
                for reading in manager.snapshot() {
                    info!(
                        "{}: {} events, last [{:.3}, {:.3}, {:.3}] {}",
                        reading.name,
                        reading.event_count,
                        reading.values.x,
                        reading.values.y,
                        reading.values.z,
                        reading.unit
                    );
                }
            }
            _ = pump.tick(), if !config.event_loop.dedicated_thread => {
                manager.poll(Duration::ZERO);
            }
        }
    }

    manager.stop_listening();
    manager.cleanup();
    info!("Shutdown complete");
    Ok(())
}
