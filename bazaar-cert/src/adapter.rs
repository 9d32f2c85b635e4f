use crate::error::{CertError, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

/// Parse every `CERTIFICATE` block of a PEM buffer, leaf first.
pub fn to_rustls_certs(cert_pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let pems = pem::parse_many(cert_pem)
        .map_err(|e| CertError::InvalidCertificate(format!("PEM parse error: {}", e)))?;

    let certs: Vec<CertificateDer<'static>> = pems
        .into_iter()
        .filter(|p| p.tag() == "CERTIFICATE")
        .map(|p| CertificateDer::from(p.into_contents()))
        .collect();

    if certs.is_empty() {
        return Err(CertError::InvalidCertificate(
            "No certificates found in PEM".into(),
        ));
    }

    Ok(certs)
}

/// Parse the first supported private key block of a PEM buffer.
pub fn to_rustls_key(key_pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    let pems = pem::parse_many(key_pem)
        .map_err(|e| CertError::InvalidKey(format!("PEM parse error: {}", e)))?;

    for p in pems {
        match p.tag() {
            // PKCS#8
            "PRIVATE KEY" => return Ok(PrivateKeyDer::Pkcs8(p.into_contents().into())),
            // PKCS#1
            "RSA PRIVATE KEY" => return Ok(PrivateKeyDer::Pkcs1(p.into_contents().into())),
            // SEC1
            "EC PRIVATE KEY" => return Ok(PrivateKeyDer::Sec1(p.into_contents().into())),
            _ => {}
        }
    }

    Err(CertError::InvalidKey(
        "No supported private key found in PEM".into(),
    ))
}
