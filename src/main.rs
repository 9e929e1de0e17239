//! # IMU Bridge
//!
//! Telemetry service for a motion-tracking device: stream IMU samples live
//! over server-sent events, or record a time-bounded session to a binary
//! log and fetch it later as JSON.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

mod config;
mod error;
mod materialize;
mod router;
mod sample;
mod server;
mod sink;
mod store;

use config::Config;
use router::{poll_and_route, RouteOutcome, SinkRouter};
use sample::source::{ImuSource, SimulatedImu};
use server::AppState;
use sink::stream::StreamSink;
use store::RecordStore;

/// Default configuration file path
const CONFIG_PATH: &str = "config/default.toml";

/// Number of routed samples between status log messages
const LOG_INTERVAL_SAMPLES: u64 = 1000;

/// Main entry point for the IMU Bridge service
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration (defaults when no file is present)
///    - Build the store, stream sink and sink router
///    - Start the HTTP server (recording control, downloads, live events)
///
/// 2. **Acquisition Loop**
///    - Poll the IMU's data-ready flag at the configured cadence
///    - Route each sample through the sink router (stream or record)
///    - Absorb acquisition faults as "no sample this cycle"
///    - Log status every 1000 routed samples
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C stops the loop
///    - Any active recording session is closed so its file is complete
///
/// # Errors
///
/// Returns error if the configuration is invalid or the server address
/// cannot be bound.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("IMU Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if Path::new(CONFIG_PATH).exists() {
        Config::load(CONFIG_PATH)?
    } else {
        info!("No configuration file at {}, using defaults", CONFIG_PATH);
        Config::default()
    };

    // Build the pipeline
    let store = RecordStore::new(&config.recordings.dir);
    let stream = StreamSink::new(config.stream.channel_capacity);
    let router = Arc::new(Mutex::new(SinkRouter::new(stream.clone(), store.clone())));

    // Start the web server
    let addr: SocketAddr = format!("{}:{}", config.server.bind_addr, config.server.port).parse()?;
    let _server = server::start(
        addr,
        AppState {
            router: Arc::clone(&router),
            store,
            stream,
        },
    )
    .await?;

    // Bring up the sample source
    if !config.imu.simulated {
        anyhow::bail!("no hardware IMU driver is linked into this build; set imu.simulated = true");
    }
    let mut source: Box<dyn ImuSource> = Box::new(SimulatedImu::new());
    info!("Using simulated IMU source");

    let mut tick = interval(Duration::from_millis(config.imu.sample_interval_ms));

    info!(
        "Starting acquisition loop at {} ms cadence",
        config.imu.sample_interval_ms
    );
    info!("Press Ctrl+C to exit");

    let mut sample_count: u64 = 0;
    let mut poll_misses: u64 = 0;
    let mut last_log_count: u64 = 0;

    // Main acquisition loop
    loop {
        tokio::select! {
            _ = tick.tick() => {
                match poll_and_route(source.as_mut(), &router).await {
                    None => {
                        poll_misses += 1;
                        continue;
                    }
                    Some(RouteOutcome::RecordingFinished { name, records }) => {
                        info!("Recording completed: {} ({} records)", name, records);
                    }
                    Some(RouteOutcome::RecordingAborted { name }) => {
                        warn!("Recording aborted: {}", name);
                    }
                    Some(_) => {}
                }

                sample_count += 1;

                // Log status every LOG_INTERVAL_SAMPLES
                if sample_count - last_log_count >= LOG_INTERVAL_SAMPLES {
                    info!(
                        "Routed {} samples ({} poll misses)",
                        sample_count, poll_misses
                    );
                    last_log_count = sample_count;
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    // Close any active recording so the file is complete on disk
    if let Some((name, records)) = router.lock().await.finish() {
        info!("Closed active recording {} ({} records)", name, records);
    }
    info!("Total samples routed: {}", sample_count);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_interval_constant() {
        // At the default 10ms cadence, 1000 samples = 10 seconds
        assert_eq!(LOG_INTERVAL_SAMPLES, 1000);
    }

    #[test]
    fn test_config_path_is_relative() {
        assert!(!CONFIG_PATH.starts_with('/'));
    }
}
