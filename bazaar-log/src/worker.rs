//! The consumer side of a [`LogSink`](crate::LogSink).
//!
//! Runs on its own OS thread and exclusively owns the buffer and the writer.
//! It never emits `tracing` events: the sink may itself be the subscriber's
//! output, and a rendezvous queue would deadlock on its own record.

use crate::record::LogRecord;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;

/// Counters shared between producers and the worker.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub submitted: AtomicU64,
    pub written: AtomicU64,
    pub flushes: AtomicU64,
    pub write_errors: AtomicU64,
    pub fallback: AtomicU64,
}

impl Counters {
    pub fn snapshot(&self) -> SinkStats {
        SinkStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            fallback: self.fallback.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a sink's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Records accepted into the queue.
    pub submitted: u64,
    /// Records handed to the writer successfully.
    pub written: u64,
    /// Successful buffer flushes.
    pub flushes: u64,
    /// Failed flushes. Their lines went to standard error instead.
    pub write_errors: u64,
    /// Lines written straight to standard error because the sink was closed.
    pub fallback: u64,
}

pub(crate) struct Worker<W> {
    writer: W,
    buffer: Vec<u8>,
    /// Records currently held in `buffer`.
    pending: u64,
    threshold: usize,
    counters: Arc<Counters>,
}

impl<W: Write> Worker<W> {
    pub fn new(writer: W, threshold: usize, counters: Arc<Counters>) -> Self {
        Self {
            writer,
            buffer: Vec::with_capacity(threshold),
            pending: 0,
            threshold,
            counters,
        }
    }

    /// Consume records until every sender is gone, then flush what is left.
    pub fn run(mut self, queue: Receiver<LogRecord>) {
        for record in queue.iter() {
            record.write_line(&mut self.buffer);
            self.pending += 1;
            if self.buffer.len() >= self.threshold {
                self.flush();
            }
        }
        self.flush();
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let result = self
            .writer
            .write_all(&self.buffer)
            .and_then(|_| self.writer.flush());

        match result {
            Ok(()) => {
                self.counters.flushes.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .written
                    .fetch_add(self.pending, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.write_errors.fetch_add(1, Ordering::Relaxed);
                let mut stderr = std::io::stderr().lock();
                let _ = writeln!(
                    stderr,
                    "bazaar-log: write failed ({}), {} record(s) follow",
                    e, self.pending
                );
                let _ = stderr.write_all(&self.buffer);
            }
        }

        self.buffer.clear();
        self.pending = 0;
    }
}
