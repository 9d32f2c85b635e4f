#![allow(dead_code)]

use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, Issuer, KeyPair};
use std::path::PathBuf;
use tempfile::TempDir;

/// Test CA able to issue `localhost` server certificates.
pub struct TestCa {
    params: CertificateParams,
    key_pair: KeyPair,
    pub cert_pem: String,
}

impl TestCa {
    pub fn new() -> Self {
        let mut params = CertificateParams::new(vec![]).unwrap();
        params
            .distinguished_name
            .push(DnType::CommonName, "Bazaar Test CA");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);

        let key_pair = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key_pair).unwrap();

        Self {
            params,
            key_pair,
            cert_pem: cert.pem(),
        }
    }

    /// Issue a `localhost` certificate with the given common name.
    pub fn issue(&self, common_name: &str) -> PemPair {
        let mut params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        params.distinguished_name.push(DnType::CommonName, common_name);

        let key_pair = KeyPair::generate().unwrap();
        let issuer = Issuer::new(self.params.clone(), &self.key_pair);
        let cert = params.signed_by(&key_pair, &issuer).unwrap();

        PemPair {
            cert: cert.pem(),
            key: key_pair.serialize_pem(),
        }
    }

    pub fn root_store(&self) -> rustls::RootCertStore {
        let mut roots = rustls::RootCertStore::empty();
        for cert in bazaar_cert::to_rustls_certs(self.cert_pem.as_bytes()).unwrap() {
            roots.add(cert).unwrap();
        }
        roots
    }
}

#[derive(Debug, Clone)]
pub struct PemPair {
    pub cert: String,
    pub key: String,
}

/// A cert/key file pair in a temporary directory.
pub struct PairOnDisk {
    _dir: TempDir,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl PairOnDisk {
    pub fn new(pair: &PemPair) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("server.crt");
        let key_path = dir.path().join("server.key");
        let on_disk = Self {
            _dir: dir,
            cert_path,
            key_path,
        };
        on_disk.replace(pair);
        on_disk
    }

    /// Overwrite both files, key first, as a renewal client would.
    pub fn replace(&self, pair: &PemPair) {
        std::fs::write(&self.key_path, &pair.key).unwrap();
        std::fs::write(&self.cert_path, &pair.cert).unwrap();
    }
}
