//! Hot-reloadable TLS certificate cache.
//!
//! One [`CertificateCache`] holds the active [`CertificateBundle`]. Readers take
//! a shared lock just long enough to clone an `Arc`; the refresh path reads,
//! fingerprints and parses the files without holding any lock and only takes
//! the write lock for the final pointer swap.

use crate::bundle::CertificateBundle;
use crate::error::{CertError, Result};
use crate::fingerprint::FileSnapshot;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rustls::crypto::CryptoProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Result of a single refresh tick.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Both fingerprints match the active bundle; nothing was parsed.
    Unchanged,
    /// A new bundle was parsed and swapped in.
    Reloaded(Arc<CertificateBundle>),
    /// The files changed (or could not be read) and the new pair was rejected.
    /// The previous bundle stays active.
    Failed(CertError),
}

impl RefreshOutcome {
    pub fn is_reloaded(&self) -> bool {
        matches!(self, RefreshOutcome::Reloaded(_))
    }
}

#[derive(Debug)]
pub struct CertificateCache {
    current: RwLock<Arc<CertificateBundle>>,
    cert_path: PathBuf,
    key_path: PathBuf,
    provider: Arc<CryptoProvider>,
    /// Serializes refreshes: at most one tick is ever in flight.
    refresh_lock: Mutex<()>,
}

impl CertificateCache {
    /// Load the initial pair with the ring crypto provider.
    pub fn load(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_provider(
            cert_path,
            key_path,
            Arc::new(rustls::crypto::ring::default_provider()),
        )
    }

    /// Load the initial pair. Any failure here is fatal for the caller: a
    /// listener must not start without a valid certificate.
    pub fn load_with_provider(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        provider: Arc<CryptoProvider>,
    ) -> Result<Self> {
        let cert_path = cert_path.as_ref().to_path_buf();
        let key_path = key_path.as_ref().to_path_buf();

        let cert = FileSnapshot::read(&cert_path)?;
        let key = FileSnapshot::read(&key_path)?;
        let bundle = CertificateBundle::from_snapshots(&cert, &key, &provider)?;

        tracing::info!(
            cert = %cert_path.display(),
            cn = bundle.metadata().display_name(),
            fingerprint = %bundle.cert_fingerprint().short(),
            not_after = %bundle.metadata().not_after,
            "TLS certificate loaded"
        );

        warn_if_expired(&bundle);

        Ok(Self {
            current: RwLock::new(Arc::new(bundle)),
            cert_path,
            key_path,
            provider,
            refresh_lock: Mutex::new(()),
        })
    }

    /// The active bundle. Never blocks on I/O.
    pub fn current(&self) -> Arc<CertificateBundle> {
        self.current.read().clone()
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    /// Run one refresh tick against the bound file pair.
    ///
    /// Blocking: reads both files. Call from a blocking context.
    pub fn refresh(&self) -> RefreshOutcome {
        let _serial = self.refresh_lock.lock();

        let cert = match FileSnapshot::read(&self.cert_path) {
            Ok(s) => s,
            Err(e) => return RefreshOutcome::Failed(e),
        };
        let key = match FileSnapshot::read(&self.key_path) {
            Ok(s) => s,
            Err(e) => return RefreshOutcome::Failed(e),
        };

        if self.current().matches(cert.fingerprint, key.fingerprint) {
            return RefreshOutcome::Unchanged;
        }

        let bundle = match CertificateBundle::from_snapshots(&cert, &key, &self.provider) {
            Ok(b) => Arc::new(b),
            Err(e) => return RefreshOutcome::Failed(e),
        };

        *self.current.write() = bundle.clone();
        RefreshOutcome::Reloaded(bundle)
    }

    /// Start the periodic refresh task on the current tokio runtime.
    ///
    /// The first tick fires one `interval` after the call. The task stops when
    /// `shutdown` is cancelled; an in-flight refresh is allowed to finish.
    pub fn watch(self: &Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run_watch(interval, shutdown))
    }

    /// The refresh loop behind [`watch`](Self::watch), for callers that
    /// manage their own task handles.
    ///
    /// A zero `interval` is rejected: the loop logs an error and returns.
    pub async fn run_watch(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        if interval.is_zero() {
            tracing::error!(
                cert = %self.cert_path.display(),
                "Certificate watcher needs a non-zero interval, not started"
            );
            return;
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; load() already covered it.
        ticker.tick().await;

        tracing::debug!(
            cert = %self.cert_path.display(),
            interval_ms = interval.as_millis() as u64,
            "Certificate watcher started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Certificate watcher received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let cache = Arc::clone(&self);
                    match tokio::task::spawn_blocking(move || cache.refresh()).await {
                        Ok(outcome) => self.log_outcome(&outcome),
                        Err(e) => tracing::error!(error = %e, "Certificate refresh task failed"),
                    }
                }
            }
        }
    }

    fn log_outcome(&self, outcome: &RefreshOutcome) {
        match outcome {
            RefreshOutcome::Unchanged => {}
            RefreshOutcome::Reloaded(bundle) => {
                tracing::info!(
                    cn = bundle.metadata().display_name(),
                    fingerprint = %bundle.cert_fingerprint().short(),
                    not_after = %bundle.metadata().not_after,
                    "TLS certificate reloaded"
                );
                warn_if_expired(bundle);
            }
            RefreshOutcome::Failed(e) => tracing::warn!(
                cert = %self.cert_path.display(),
                error = %e,
                "Failed to reload TLS certificate, keeping previous one"
            ),
        }
    }
}

/// Expired pairs are still served; clients decide what to do with them.
fn warn_if_expired(bundle: &CertificateBundle) -> bool {
    let metadata = bundle.metadata();
    let expired = metadata.is_expired_at(Utc::now());
    if expired {
        tracing::warn!(
            cn = metadata.display_name(),
            not_after = %metadata.not_after,
            "Active TLS certificate has already expired"
        );
    }
    expired
}
