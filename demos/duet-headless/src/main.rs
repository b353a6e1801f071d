//! DUET Headless Demo
//!
//! Runs one complete installation session without a camera or a screen:
//! - A synthetic sensor streams one or two dancing bodies
//! - The record button is pressed once at startup
//! - The mirrored models train after the capture
//! - Live prediction runs until the sensor stops
//!
//! Usage: duet-headless [CONFIG.json] [--duet]
//!
//! Set RUST_LOG to change verbosity and DUET_LOG_JSON=1 for JSON logs.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use duet_model::MlpBackend;
use duet_runtime::{Installation, InstallationConfig, LogSink, TriggerSource};
use duet_skeleton::{NoopPhysics, PrimitiveRecorder};
use duet_test::{run_sensor, DancerSimulator};

/// Sensor frame rate of the simulated camera
const SENSOR_INTERVAL: Duration = Duration::from_millis(33);

/// Seconds of live prediction after training
const PREDICT_FOR: Duration = Duration::from_secs(3);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("DUET_LOG_JSON").map_or(false, |v| v == "1");
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let duet = args.iter().any(|a| a == "--duet");
    let config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => InstallationConfig::load(path)?,
        None => InstallationConfig::quick_demo(),
    };

    let session = &config.session;
    let recordings = if duet { 1 } else { 2 };
    let session_time = session.pre_roll + session.recording_duration * recordings + PREDICT_FOR;
    let frames = (session_time.as_millis() / SENSOR_INTERVAL.as_millis()) as u64;
    tracing::info!(duet, frames, "starting headless session");

    let mut simulator = if duet {
        DancerSimulator::duet(42)
    } else {
        DancerSimulator::solo(42)
    };

    let mut installation = Installation::new(
        config,
        MlpBackend,
        PrimitiveRecorder::new(),
        NoopPhysics::default(),
        LogSink,
    )?;

    // Let the session see the dancers before the button press
    let now = Instant::now();
    installation.on_detection(simulator.frame(Duration::ZERO), now);
    installation.trigger(TriggerSource::Button, now);

    let (tx, rx) = mpsc::channel(64);
    let sensor = tokio::spawn(run_sensor(simulator, tx, frames, SENSOR_INTERVAL));

    let mut installation = installation.run(rx).await;
    // Training may still be running if the sensor stopped early
    installation.wait_for_training().await;
    let simulator = sensor.await?;

    let stats = installation.stats();
    tracing::info!(
        state = %installation.state(),
        sensor_frames = simulator.frames(),
        detections = stats.detections,
        captured = stats.frames_captured,
        ticks = stats.ticks,
        trainings = stats.trainings_completed,
        rendered_frames = installation.renderer().frames(),
        last_primitives = stats.last_primitives,
        "session finished"
    );

    Ok(())
}
