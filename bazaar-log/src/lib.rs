//! Batching log sink for the Bazaar runtime.
//!
//! ```ignore
//! let sink = LogSink::new(LogSinkConfig::default(), std::io::stdout())?;
//! sink.info("listener started");
//! sink.close()?;
//! ```

mod config;
mod error;
mod layer;
mod record;
mod sink;
mod worker;

pub use config::{DEFAULT_BUFFER_THRESHOLD, DEFAULT_DRAIN_TIMEOUT, LogSinkConfig, QueueCapacity};
pub use error::LogSinkError;
pub use layer::LogSinkLayer;
pub use record::{Level, LogRecord};
pub use sink::LogSink;
pub use worker::SinkStats;
