use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogSinkError {
    #[error("Failed to spawn log sink worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Log sink did not drain within {0:?}")]
    DrainTimeout(Duration),
    #[error("Log sink worker panicked")]
    WorkerPanicked,
}
