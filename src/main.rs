//! Serial Telemetry Logger - Main Entry Point
//!
//! Usage: `serial-telemetry [config.toml] [port]`
//!
//! Logs decoded readings for the configured session duration, optionally
//! recording them to a JSON Lines file.

use anyhow::Context;
use serial_telemetry::{
    config::AppConfig,
    listener::{JsonLinesRecorder, TracingListener},
    Controller,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn init_logging(config: &AppConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));

    let (file_layer, guard) = match &config.logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "serial-telemetry.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let port = args.next();

    let mut config = AppConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = port {
        config.link.port = port;
    }

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&config);

    tracing::info!("Starting serial telemetry logger");

    let mut controller = Controller::from_config(&config)?;
    controller.register_listener(Arc::new(TracingListener));

    if config.recording.enabled {
        if let Some(path) = &config.recording.path {
            let recorder = JsonLinesRecorder::create(path, config.recording.append)?;
            controller.register_listener(Arc::new(recorder));
        }
    }

    controller.start().context("Failed to start reading")?;

    let outcome = match config.session.duration() {
        Some(duration) => {
            tracing::info!("Logging for {:?}", duration);
            std::thread::sleep(duration);
            controller.stop()
        }
        None => {
            tracing::info!("Logging until the link closes");
            controller.wait()
        }
    };

    let stats = controller.stats();
    tracing::info!(
        "Session finished: {} lines, {} readings, {} schemas, {} skipped frames",
        stats.lines,
        stats.readings,
        stats.schemas,
        stats.skipped()
    );

    outcome.context("Serial session ended with an error")?;
    Ok(())
}
