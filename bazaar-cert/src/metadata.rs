use crate::error::{CertError, Result};
use chrono::{DateTime, Utc};

/// Descriptive fields of a leaf certificate, extracted once at parse time so
/// log lines and banners never have to touch DER again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertMetadata {
    pub common_name: Option<String>,
    pub serial_number: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CertMetadata {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, x509) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| CertError::InvalidCertificate(format!("X509 parse error: {}", e)))?;

        let mut common_name = None;
        for rdn in x509.subject().iter_rdn() {
            for attr in rdn.iter() {
                if attr.attr_type() == &x509_parser::oid_registry::OID_X509_COMMON_NAME {
                    common_name = attr.as_str().ok().map(|s| s.to_string());
                }
            }
        }

        // Serial Number (Hex)
        let serial_number = x509.tbs_certificate.serial.to_str_radix(16);

        let validity = x509.validity();
        let not_before = to_utc(validity.not_before.timestamp())?;
        let not_after = to_utc(validity.not_after.timestamp())?;

        Ok(Self {
            common_name,
            serial_number,
            not_before,
            not_after,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.not_after
    }

    pub fn display_name(&self) -> &str {
        self.common_name.as_deref().unwrap_or("<no CN>")
    }
}

fn to_utc(timestamp: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| CertError::InvalidCertificate(format!("Validity out of range: {}", timestamp)))
}
