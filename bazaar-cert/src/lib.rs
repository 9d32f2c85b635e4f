//! TLS certificate handling for the Bazaar runtime.
//!
//! - [`CertificateCache`]: the active certificate/key pair, hot-reloaded from
//!   disk by a background watcher
//! - [`CertResolver`]: rustls per-handshake lookup into the cache
//! - PEM helpers shared with the host binary

mod adapter;
mod bundle;
mod cache;
mod error;
mod fingerprint;
mod metadata;
mod resolver;

pub use adapter::{to_rustls_certs, to_rustls_key};
pub use bundle::CertificateBundle;
pub use cache::{CertificateCache, RefreshOutcome};
pub use error::{CertError, Result};
pub use fingerprint::{FileSnapshot, Fingerprint};
pub use metadata::CertMetadata;
pub use resolver::{CertResolver, server_config};
