use crate::adapter::{to_rustls_certs, to_rustls_key};
use crate::error::{CertError, Result};
use crate::fingerprint::{FileSnapshot, Fingerprint};
use crate::metadata::CertMetadata;
use rustls::crypto::CryptoProvider;
use rustls::sign::CertifiedKey;
use rustls::{Error as TlsError, InconsistentKeys};
use std::sync::Arc;

/// An immutable, internally consistent certificate/key pair.
///
/// A bundle is built in one piece from the bytes of both files and is never
/// modified afterwards. Replacement happens by swapping the whole `Arc`.
#[derive(Debug)]
pub struct CertificateBundle {
    certified_key: Arc<CertifiedKey>,
    cert_fingerprint: Fingerprint,
    key_fingerprint: Fingerprint,
    metadata: CertMetadata,
}

impl CertificateBundle {
    /// Build a bundle from the raw PEM bytes of a certificate chain and its key.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8], provider: &CryptoProvider) -> Result<Self> {
        let cert = FileSnapshot {
            bytes: cert_pem.to_vec(),
            fingerprint: Fingerprint::of(cert_pem),
        };
        let key = FileSnapshot {
            bytes: key_pem.to_vec(),
            fingerprint: Fingerprint::of(key_pem),
        };
        Self::from_snapshots(&cert, &key, provider)
    }

    pub(crate) fn from_snapshots(
        cert: &FileSnapshot,
        key: &FileSnapshot,
        provider: &CryptoProvider,
    ) -> Result<Self> {
        let chain = to_rustls_certs(&cert.bytes)?;
        let metadata = CertMetadata::from_der(chain[0].as_ref())?;

        let key_der = to_rustls_key(&key.bytes)?;
        let signing_key = provider
            .key_provider
            .load_private_key(key_der)
            .map_err(|e| CertError::InvalidKey(e.to_string()))?;

        let certified_key = CertifiedKey::new(chain, signing_key);
        match certified_key.keys_match() {
            // Some key types cannot report their public half; rustls accepts
            // those as-is and so do we.
            Ok(()) | Err(TlsError::InconsistentKeys(InconsistentKeys::Unknown)) => {}
            Err(e) => return Err(CertError::KeyMismatch(e.to_string())),
        }

        Ok(Self {
            certified_key: Arc::new(certified_key),
            cert_fingerprint: cert.fingerprint,
            key_fingerprint: key.fingerprint,
            metadata,
        })
    }

    pub fn certified_key(&self) -> &Arc<CertifiedKey> {
        &self.certified_key
    }

    pub fn cert_fingerprint(&self) -> Fingerprint {
        self.cert_fingerprint
    }

    pub fn key_fingerprint(&self) -> Fingerprint {
        self.key_fingerprint
    }

    pub fn metadata(&self) -> &CertMetadata {
        &self.metadata
    }

    /// True if the given file fingerprints describe exactly this bundle.
    pub fn matches(&self, cert: Fingerprint, key: Fingerprint) -> bool {
        self.cert_fingerprint == cert && self.key_fingerprint == key
    }
}
