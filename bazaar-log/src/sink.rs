//! Asynchronous batching log sink.
//!
//! Any number of threads call [`LogSink::submit`]; a single worker thread
//! batches the formatted lines and flushes them to the writer whenever the
//! buffer reaches the configured threshold.
//!
//! # Shutdown
//!
//! [`LogSink::close`] drops the queue's sender, which lets the worker drain
//! every record already handed over, flush once more and exit. The caller
//! waits for that confirmation at most `drain_timeout`. `close` only returns
//! `Ok(())` once the worker has confirmed the final flush: after a
//! `DrainTimeout` later calls wait on the same worker again, and after a
//! confirmed drain they return `Ok(())` straight away.

use crate::config::{LogSinkConfig, QueueCapacity};
use crate::error::LogSinkError;
use crate::record::{Level, LogRecord};
use crate::worker::{Counters, SinkStats, Worker};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Clone)]
enum QueueSender {
    Bounded(SyncSender<LogRecord>),
    Unbounded(Sender<LogRecord>),
}

impl QueueSender {
    /// Blocks while a bounded queue is full. Returns the record if the worker
    /// is gone.
    fn send(&self, record: LogRecord) -> Result<(), LogRecord> {
        match self {
            QueueSender::Bounded(tx) => tx.send(record).map_err(|e| e.0),
            QueueSender::Unbounded(tx) => tx.send(record).map_err(|e| e.0),
        }
    }
}

struct WorkerHandle {
    /// Receives one message after the final flush.
    done: Receiver<()>,
    thread: JoinHandle<()>,
}

enum Lifecycle {
    Running(WorkerHandle),
    /// Queue closed, final flush not yet confirmed.
    Draining(WorkerHandle),
    Closed,
    /// The worker died before confirming the final flush.
    Failed,
}

pub struct LogSink {
    /// `None` once closed. Producers clone it under the read lock and send
    /// outside of it, so the queue only closes after in-flight sends land.
    sender: RwLock<Option<QueueSender>>,
    lifecycle: Mutex<Lifecycle>,
    counters: Arc<Counters>,
    config: LogSinkConfig,
}

impl LogSink {
    /// Start the worker thread writing into `writer`.
    pub fn new<W>(config: LogSinkConfig, writer: W) -> Result<Self, LogSinkError>
    where
        W: Write + Send + 'static,
    {
        let (sender, queue) = match config.queue {
            QueueCapacity::Bounded(capacity) => {
                let (tx, rx) = mpsc::sync_channel(capacity);
                (QueueSender::Bounded(tx), rx)
            }
            QueueCapacity::Unbounded => {
                let (tx, rx) = mpsc::channel();
                (QueueSender::Unbounded(tx), rx)
            }
        };

        let counters = Arc::new(Counters::default());
        let worker = Worker::new(writer, config.buffer_threshold, Arc::clone(&counters));
        let (done_tx, done_rx) = mpsc::sync_channel(1);

        let thread = std::thread::Builder::new()
            .name("bazaar-log-sink".into())
            .spawn(move || {
                worker.run(queue);
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            sender: RwLock::new(Some(sender)),
            lifecycle: Mutex::new(Lifecycle::Running(WorkerHandle {
                done: done_rx,
                thread,
            })),
            counters,
            config,
        })
    }

    /// Queue a message. Never fails; see [`QueueCapacity`] for when it blocks.
    ///
    /// After `close`, the line is written to standard error instead.
    pub fn submit(&self, level: Level, message: impl Into<String>) {
        self.submit_record(LogRecord::new(level, message));
    }

    pub fn submit_record(&self, record: LogRecord) {
        let sender = self.sender.read().clone();
        let Some(sender) = sender else {
            self.fallback(&record);
            return;
        };

        match sender.send(record) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
            }
            // Worker died; keep the line visible somewhere.
            Err(record) => self.fallback(&record),
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.submit(Level::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.submit(Level::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.submit(Level::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.submit(Level::Error, message);
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.submit(Level::Fatal, message);
    }

    /// Drain and stop the worker, waiting at most the configured
    /// `drain_timeout`.
    pub fn close(&self) -> Result<(), LogSinkError> {
        self.close_timeout(self.config.drain_timeout)
    }

    /// Drain and stop the worker, waiting at most `timeout`.
    ///
    /// On `DrainTimeout` the worker keeps draining in the background if the
    /// writer ever unblocks; the next call waits for it again. If the sink is
    /// dropped first, the thread is detached.
    pub fn close_timeout(&self, timeout: Duration) -> Result<(), LogSinkError> {
        // Held for the whole wait so a concurrent caller sees the outcome.
        let mut lifecycle = self.lifecycle.lock();
        let handle = match std::mem::replace(&mut *lifecycle, Lifecycle::Closed) {
            Lifecycle::Running(handle) => {
                drop(self.sender.write().take());
                handle
            }
            Lifecycle::Draining(handle) => handle,
            Lifecycle::Closed => return Ok(()),
            Lifecycle::Failed => {
                *lifecycle = Lifecycle::Failed;
                return Err(LogSinkError::WorkerPanicked);
            }
        };

        match handle.done.recv_timeout(timeout) {
            Ok(()) => handle.thread.join().map_err(|_| {
                *lifecycle = Lifecycle::Failed;
                LogSinkError::WorkerPanicked
            }),
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.thread.join();
                *lifecycle = Lifecycle::Failed;
                Err(LogSinkError::WorkerPanicked)
            }
            Err(RecvTimeoutError::Timeout) => {
                *lifecycle = Lifecycle::Draining(handle);
                Err(LogSinkError::DrainTimeout(timeout))
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    pub fn stats(&self) -> SinkStats {
        self.counters.snapshot()
    }

    pub fn config(&self) -> &LogSinkConfig {
        &self.config
    }

    fn fallback(&self, record: &LogRecord) {
        self.counters.fallback.fetch_add(1, Ordering::Relaxed);
        let _ = std::io::stderr().write_all(record.to_line().as_bytes());
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            eprintln!("bazaar-log: {}", e);
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("closed", &self.is_closed())
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
