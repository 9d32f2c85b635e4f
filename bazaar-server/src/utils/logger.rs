//! Logging Infrastructure
//!
//! All `tracing` events go through a [`LogSink`], so request handlers never
//! wait on the log writer beyond the queue hand-off. The sink writes to stdout,
//! or to a daily rolling file under `LOG_DIR` when one is configured; in that
//! case a console layer is added as well (JSON in production).

use crate::core::{Config, ServerError, ServerResult};
use bazaar_log::{LogSink, LogSinkLayer};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const LOG_FILE_PREFIX: &str = "bazaar.log";

/// Writer behind the log sink for the given log directory
pub fn log_writer(log_dir: Option<&str>) -> ServerResult<Box<dyn Write + Send>> {
    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(Path::new(dir))?;
            Ok(Box::new(tracing_appender::rolling::daily(
                dir,
                LOG_FILE_PREFIX,
            )))
        }
        None => Ok(Box::new(std::io::stdout())),
    }
}

/// Initialize the global subscriber and return the sink behind it.
///
/// The caller owns shutdown: call [`LogSink::close`] before exiting so the
/// last buffered lines reach the writer. `RUST_LOG` overrides `LOG_LEVEL`.
pub fn init_logger(config: &Config) -> ServerResult<Arc<LogSink>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            ServerError::Config(format!("invalid LOG_LEVEL '{}': {}", config.log_level, e))
        })?,
    };

    let writer = log_writer(config.log_dir.as_deref())?;
    let sink = Arc::new(LogSink::new(config.log_sink.clone(), writer)?);

    let console: Option<Box<dyn Layer<Registry> + Send + Sync>> = match config.log_dir {
        Some(_) if config.is_production() => Some(fmt::layer().json().boxed()),
        Some(_) => Some(fmt::layer().with_target(false).boxed()),
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(LogSinkLayer::new(Arc::clone(&sink)))
        .with(filter)
        .try_init()
        .map_err(|e| ServerError::Internal(format!("Failed to install logger: {}", e)))?;

    Ok(sink)
}
