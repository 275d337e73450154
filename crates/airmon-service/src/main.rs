//! Airmon Service - Sensor sampler and HTTP API.
//!
//! Run with: `cargo run -p airmon-service -- --simulate`

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use airmon_core::{Clock, MockClimateSensor, MockParticulateSensor, SensorReader};
use airmon_service::{
    AppState, CommandShutdown, Config, ProcessShutdown, Sampler, SensorsConfig, ShutdownHandle, api,
};
use airmon_store::SessionLogger;

/// Airmon Service - Sensor sampler and HTTP REST API.
#[derive(Parser, Debug)]
#[command(name = "airmon-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Session log directory (overrides config).
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Disable the CSV session log.
    #[arg(long)]
    no_log: bool,

    /// Use simulated sensors instead of the I²C bus.
    #[arg(long)]
    simulate: bool,

    /// Sampling interval in seconds (overrides config).
    #[arg(short, long)]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("airmon_service=info".parse()?)
                .add_directive("airmon_core=info".parse()?)
                .add_directive("airmon_store=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_else(|e| {
            warn!("Ignoring unreadable default config: {}", e);
            Config::default()
        }),
    };

    // Override config with CLI args
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(dir) = args.log_dir {
        config.logging.dir = dir;
    }
    if args.no_log {
        config.logging.enabled = false;
    }
    if args.simulate {
        config.sensors.simulate = true;
    }
    if let Some(secs) = args.interval {
        config.sampling.interval_secs = secs;
    }
    config.validate()?;

    let token = CancellationToken::new();
    let shutdown: Arc<dyn ShutdownHandle> = if config.shutdown.command.is_empty() {
        Arc::new(ProcessShutdown::new(token.clone()))
    } else {
        info!("Shutdown command: {}", config.shutdown.command.join(" "));
        Arc::new(CommandShutdown::new(&config.shutdown.command, token.clone())?)
    };

    let clock = Clock::new();
    let reader = build_reader(&config.sensors, clock)?.with_timeout(config.sampling.read_timeout());

    // Create application state
    let state = AppState::new(config.clone(), shutdown);

    // Open the session log
    let logger = if config.logging.enabled {
        match SessionLogger::open(&config.logging.dir, clock.started_at()) {
            Ok(logger) => {
                state.sampler.set_log_path(Some(logger.path())).await;
                Some(logger)
            }
            Err(e) => {
                warn!("Session logging disabled: {}", e);
                state.sampler.set_log_error(&e.to_string()).await;
                None
            }
        }
    } else {
        info!("Session logging disabled");
        None
    };

    // Start the sampler
    let sampler = Sampler::new(Arc::clone(&state), reader, logger, token.clone()).spawn();

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let ctrl_c = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, shutting down");
                ctrl_c.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    info!("Starting server on {}", config.server.bind);

    // Run the server
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    let server_token = token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await?;

    token.cancel();
    sampler.await?;
    info!("Stopped");

    Ok(())
}

/// Build the sensor reader for the configured hardware.
fn build_reader(sensors: &SensorsConfig, clock: Clock) -> anyhow::Result<SensorReader> {
    if sensors.simulate {
        info!("Using simulated sensors");
        return Ok(SensorReader::new(
            Arc::new(MockParticulateSensor::simulated()),
            Arc::new(MockClimateSensor::simulated()),
            clock,
        ));
    }

    open_hardware(sensors, clock)
}

#[cfg(target_os = "linux")]
fn open_hardware(sensors: &SensorsConfig, clock: Clock) -> anyhow::Result<SensorReader> {
    use airmon_core::{Aht20, Pmsa003i};

    info!("Opening sensors on {}", sensors.i2c_bus.display());
    let particulate_address = u8::try_from(sensors.particulate_address)?;
    let climate_address = u8::try_from(sensors.climate_address)?;
    let particulate = Pmsa003i::open(&sensors.i2c_bus, particulate_address)?;
    let climate = Aht20::open(&sensors.i2c_bus, climate_address)?;
    Ok(SensorReader::new(
        Arc::new(particulate),
        Arc::new(climate),
        clock,
    ))
}

#[cfg(not(target_os = "linux"))]
fn open_hardware(_sensors: &SensorsConfig, _clock: Clock) -> anyhow::Result<SensorReader> {
    anyhow::bail!("I2C sensors are only supported on Linux; use --simulate")
}
