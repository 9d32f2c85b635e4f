use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default flush threshold in bytes.
pub const DEFAULT_BUFFER_THRESHOLD: usize = 1024;

/// Default deadline for [`LogSink::close`](crate::LogSink::close).
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How many records may wait between producers and the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCapacity {
    /// At most `n` queued records; producers block while it is full.
    /// `Bounded(0)` is a synchronous handoff: every `submit` waits for the
    /// consumer to take the record.
    Bounded(usize),
    /// Always accepts. Producers never block, memory is the only limit.
    Unbounded,
}

impl Default for QueueCapacity {
    fn default() -> Self {
        QueueCapacity::Bounded(0)
    }
}

impl fmt::Display for QueueCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueCapacity::Bounded(n) => write!(f, "{}", n),
            QueueCapacity::Unbounded => f.write_str("unbounded"),
        }
    }
}

impl FromStr for QueueCapacity {
    type Err = String;

    /// Accepts a record count or `unbounded`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(QueueCapacity::Unbounded);
        }
        s.parse::<usize>()
            .map(QueueCapacity::Bounded)
            .map_err(|_| format!("invalid queue capacity '{}': expected a number or 'unbounded'", s))
    }
}

/// Log sink settings.
#[derive(Debug, Clone)]
pub struct LogSinkConfig {
    /// Flush once the pending buffer holds at least this many bytes.
    pub buffer_threshold: usize,
    pub queue: QueueCapacity,
    /// Upper bound on how long `close()` waits for the final flush.
    pub drain_timeout: Duration,
}

impl Default for LogSinkConfig {
    fn default() -> Self {
        Self {
            buffer_threshold: DEFAULT_BUFFER_THRESHOLD,
            queue: QueueCapacity::default(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl LogSinkConfig {
    pub fn with_buffer_threshold(mut self, bytes: usize) -> Self {
        self.buffer_threshold = bytes;
        self
    }

    pub fn with_queue(mut self, queue: QueueCapacity) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}
