//! Logging setup
//!
//! Everything goes to stderr because stdout carries the JSON-RPC stream. An
//! optional daily-rolling log file can be added through `IOBROKER_LOG_FILE`.

use crate::config::LoggingConfig;
use crate::error::{IoBrokerError, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Filter directive for the configured level, `--debug` wins
pub fn filter_directive(config: &LoggingConfig, debug: bool) -> String {
    if debug {
        "debug".to_string()
    } else {
        config.level.clone()
    }
}

fn stderr_layer(json: bool) -> BoxedLayer {
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    if json {
        layer.json().boxed()
    } else {
        layer.with_ansi(false).compact().boxed()
    }
}

/// Initialize the global subscriber
///
/// The returned guard flushes the file writer and must be held until exit.
pub fn init_logging(config: &LoggingConfig, debug: bool) -> Result<Option<WorkerGuard>> {
    let directive = filter_directive(config, debug);
    let env_filter = EnvFilter::try_new(&directive)
        .map_err(|e| IoBrokerError::config(format!("Invalid log filter '{directive}': {e}")))?;

    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(config.json_format)];
    let mut guard = None;

    if let Some(file_path) = &config.file {
        let directory = file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(directory)?;

        let file_name = file_path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("iobroker-mcp.log"));
        let appender = tracing_appender::rolling::daily(directory, file_name);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        guard = Some(file_guard);

        let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
        layers.push(if config.json_format {
            file_layer.json().boxed()
        } else {
            file_layer.boxed()
        });
    }

    let subscriber = tracing_subscriber::registry().with(layers).with(env_filter);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| IoBrokerError::config(format!("Failed to install logger: {e}")))?;

    Ok(guard)
}
