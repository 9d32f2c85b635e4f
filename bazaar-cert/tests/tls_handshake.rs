mod common;

use bazaar_cert::{CertificateCache, server_config, to_rustls_certs};
use common::{PairOnDisk, TestCa};
use rustls::pki_types::{CertificateDer, ServerName};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tokio_util::sync::CancellationToken;

/// Accept TLS connections until cancelled, answering each with `ok`.
async fn spawn_server(cache: Arc<CertificateCache>, shutdown: CancellationToken) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = TlsAcceptor::from(server_config(cache, &[]).unwrap());

    tokio::spawn(async move {
        loop {
            let stream = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(_) => break,
                },
            };
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut tls) = acceptor.accept(stream).await {
                    let _ = tls.write_all(b"ok").await;
                    let _ = tls.shutdown().await;
                }
            });
        }
    });

    addr
}

/// Connect, complete the handshake and return the leaf certificate presented.
async fn presented_leaf(addr: SocketAddr, ca: &TestCa) -> CertificateDer<'static> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(ca.root_store())
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let tcp = TcpStream::connect(addr).await.unwrap();
    let server_name = ServerName::try_from("localhost").unwrap();
    let mut tls = connector.connect(server_name, tcp).await.unwrap();

    let mut reply = Vec::new();
    tls.read_to_end(&mut reply).await.unwrap();
    assert_eq!(reply, b"ok");

    let (_, session) = tls.get_ref();
    session.peer_certificates().unwrap()[0].clone().into_owned()
}

fn leaf_of(cert_pem: &str) -> CertificateDer<'static> {
    to_rustls_certs(cert_pem.as_bytes()).unwrap().remove(0)
}

#[tokio::test]
async fn test_handshake_serves_reloaded_certificate() {
    let ca = TestCa::new();
    let pair_a = ca.issue("bazaar-a");
    let pair_b = ca.issue("bazaar-b");
    let files = PairOnDisk::new(&pair_a);

    let cache = Arc::new(CertificateCache::load(&files.cert_path, &files.key_path).unwrap());
    let shutdown = CancellationToken::new();
    let addr = spawn_server(Arc::clone(&cache), shutdown.clone()).await;

    assert_eq!(presented_leaf(addr, &ca).await, leaf_of(&pair_a.cert));

    // New files are not served until a refresh runs.
    files.replace(&pair_b);
    assert_eq!(presented_leaf(addr, &ca).await, leaf_of(&pair_a.cert));

    assert!(cache.refresh().is_reloaded());
    assert_eq!(presented_leaf(addr, &ca).await, leaf_of(&pair_b.cert));

    shutdown.cancel();
}

#[tokio::test]
async fn test_handshake_survives_broken_update() {
    let ca = TestCa::new();
    let pair_a = ca.issue("bazaar-a");
    let files = PairOnDisk::new(&pair_a);

    let cache = Arc::new(CertificateCache::load(&files.cert_path, &files.key_path).unwrap());
    let shutdown = CancellationToken::new();
    let addr = spawn_server(Arc::clone(&cache), shutdown.clone()).await;

    std::fs::write(&files.key_path, "not a key").unwrap();
    assert!(!cache.refresh().is_reloaded());

    assert_eq!(presented_leaf(addr, &ca).await, leaf_of(&pair_a.cert));

    shutdown.cancel();
}

#[tokio::test]
async fn test_alpn_protocols_are_advertised() {
    let ca = TestCa::new();
    let files = PairOnDisk::new(&ca.issue("bazaar-alpn"));
    let cache = Arc::new(CertificateCache::load(&files.cert_path, &files.key_path).unwrap());

    let config = server_config(cache, &[b"h2".as_slice(), b"http/1.1".as_slice()]).unwrap();
    assert_eq!(
        config.alpn_protocols,
        vec![b"h2".to_vec(), b"http/1.1".to_vec()]
    );
}
