use crate::cache::CertificateCache;
use crate::error::{CertError, Result};
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use std::sync::Arc;

/// Per-handshake certificate lookup backed by a [`CertificateCache`].
///
/// The client hello is ignored: every SNI gets the single active pair.
#[derive(Debug, Clone)]
pub struct CertResolver {
    cache: Arc<CertificateCache>,
}

impl CertResolver {
    pub fn new(cache: Arc<CertificateCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<CertificateCache> {
        &self.cache
    }
}

impl CertificateCache {
    /// A resolver sharing this cache.
    pub fn resolver(self: &Arc<Self>) -> CertResolver {
        CertResolver::new(Arc::clone(self))
    }
}

impl ResolvesServerCert for CertResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(Arc::clone(self.cache.current().certified_key()))
    }
}

/// Build a rustls server config whose certificate is looked up through the
/// cache on every handshake, so reloads apply to new connections immediately.
pub fn server_config(
    cache: Arc<CertificateCache>,
    alpn_protocols: &[&[u8]],
) -> Result<Arc<rustls::ServerConfig>> {
    let provider = Arc::clone(cache.provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| CertError::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(CertResolver::new(cache)));

    config.alpn_protocols = alpn_protocols.iter().map(|p| p.to_vec()).collect();
    Ok(Arc::new(config))
}
