use bazaar_server::{Config, Server, ServerError};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, Issuer, KeyPair};
use rustls::pki_types::{CertificateDer, ServerName};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;

const PING: &[u8] = b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";

struct TestCa {
    params: CertificateParams,
    key_pair: KeyPair,
    cert_pem: String,
}

impl TestCa {
    fn new() -> Self {
        let mut params = CertificateParams::new(vec![]).unwrap();
        params
            .distinguished_name
            .push(DnType::CommonName, "Bazaar Server Test CA");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let key_pair = KeyPair::generate().unwrap();
        let cert_pem = params.self_signed(&key_pair).unwrap().pem();
        Self {
            params,
            key_pair,
            cert_pem,
        }
    }

    /// Returns (cert PEM, key PEM) for `localhost`.
    fn issue(&self, common_name: &str) -> (String, String) {
        let mut params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        params.distinguished_name.push(DnType::CommonName, common_name);
        let key_pair = KeyPair::generate().unwrap();
        let issuer = Issuer::new(self.params.clone(), &self.key_pair);
        let cert = params.signed_by(&key_pair, &issuer).unwrap();
        (cert.pem(), key_pair.serialize_pem())
    }

    fn connector(&self) -> TlsConnector {
        let mut roots = rustls::RootCertStore::empty();
        for cert in bazaar_cert::to_rustls_certs(self.cert_pem.as_bytes()).unwrap() {
            roots.add(cert).unwrap();
        }
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(roots)
            .with_no_client_auth();
        TlsConnector::from(Arc::new(config))
    }
}

fn write_pair(dir: &Path, (cert, key): &(String, String)) {
    std::fs::write(dir.join("server.key"), key).unwrap();
    std::fs::write(dir.join("server.crt"), cert).unwrap();
}

fn config(vars: &[(&str, String)]) -> Config {
    let mut map: HashMap<String, String> = HashMap::from([
        ("HOST".to_string(), "127.0.0.1".to_string()),
        ("PORT".to_string(), "0".to_string()),
        ("SHUTDOWN_TIMEOUT_MS".to_string(), "1000".to_string()),
    ]);
    for (key, value) in vars {
        map.insert(key.to_string(), value.clone());
    }
    Config::from_lookup(|key| map.get(key).cloned()).unwrap()
}

fn tls_config(dir: &Path) -> Config {
    config(&[
        (
            "TLS_CERT_FILE_PATH",
            dir.join("server.crt").display().to_string(),
        ),
        (
            "TLS_KEY_FILE_PATH",
            dir.join("server.key").display().to_string(),
        ),
        ("TLS_REFRESH_INTERVAL_SECS", "1".to_string()),
    ])
}

/// Start the server and wait until it is listening.
async fn start(
    config: Config,
) -> (
    SocketAddr,
    oneshot::Sender<()>,
    JoinHandle<Result<(), ServerError>>,
) {
    let server = Server::new(config);
    let handle = server.handle();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let join = tokio::spawn(server.run_until(async move {
        let _ = stop_rx.await;
    }));
    let addr = tokio::time::timeout(Duration::from_secs(5), handle.listening())
        .await
        .expect("server did not start listening")
        .expect("server failed to bind");
    (addr, stop_tx, join)
}

/// Send a ping and read until the body shows up or the peer closes.
async fn exchange<S>(mut stream: S) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(PING).await.unwrap();
    let mut response = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                response.extend_from_slice(&chunk[..n]);
                if response.ends_with(b"pong") {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&response).into_owned()
}

async fn https_ping(addr: SocketAddr, ca: &TestCa) -> (String, CertificateDer<'static>) {
    let tcp = TcpStream::connect(addr).await.unwrap();
    let server_name = ServerName::try_from("localhost").unwrap();
    let tls = ca.connector().connect(server_name, tcp).await.unwrap();
    let leaf = tls.get_ref().1.peer_certificates().unwrap()[0]
        .clone()
        .into_owned();
    (exchange(tls).await, leaf)
}

fn leaf_of(cert_pem: &str) -> CertificateDer<'static> {
    bazaar_cert::to_rustls_certs(cert_pem.as_bytes())
        .unwrap()
        .remove(0)
}

#[tokio::test]
async fn test_plain_http_ping() {
    let (addr, stop, join) = start(config(&[])).await;

    let response = exchange(TcpStream::connect(addr).await.unwrap()).await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("pong"), "{response}");

    stop.send(()).unwrap();
    join.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_https_ping_follows_certificate_rotation() {
    let ca = TestCa::new();
    let pair_a = ca.issue("bazaar-a");
    let pair_b = ca.issue("bazaar-b");
    let dir = tempfile::tempdir().unwrap();
    write_pair(dir.path(), &pair_a);

    let (addr, stop, join) = start(tls_config(dir.path())).await;

    let (response, leaf) = https_ping(addr, &ca).await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with("pong"), "{response}");
    assert_eq!(leaf, leaf_of(&pair_a.0));

    write_pair(dir.path(), &pair_b);

    let expected = leaf_of(&pair_b.0);
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let (response, leaf) = https_ping(addr, &ca).await;
        assert!(response.ends_with("pong"), "{response}");
        if leaf == expected {
            break;
        }
        assert!(Instant::now() < deadline, "rotated certificate never served");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    stop.send(()).unwrap();
    join.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_broken_rotation_keeps_serving() {
    let ca = TestCa::new();
    let pair = ca.issue("bazaar-a");
    let dir = tempfile::tempdir().unwrap();
    write_pair(dir.path(), &pair);

    let (addr, stop, join) = start(tls_config(dir.path())).await;

    std::fs::write(dir.path().join("server.crt"), "not a certificate").unwrap();
    // Give the watcher at least one tick over the broken file.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let (response, leaf) = https_ping(addr, &ca).await;
    assert!(response.ends_with("pong"), "{response}");
    assert_eq!(leaf, leaf_of(&pair.0));

    stop.send(()).unwrap();
    join.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_missing_certificate_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let server = Server::new(tls_config(dir.path()));

    let result = server.run_until(std::future::pending()).await;
    match result {
        Err(ServerError::Cert(bazaar_cert::CertError::Read { path, .. })) => {
            assert!(path.ends_with("server.crt"), "{}", path.display());
        }
        other => panic!("expected a read error, got {other:?}"),
    }
}
