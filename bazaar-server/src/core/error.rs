//! 服务器错误类型

use bazaar_cert::CertError;
use bazaar_log::LogSinkError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Certificate error: {0}")]
    Cert(#[from] CertError),

    #[error("Log sink error: {0}")]
    LogSink(#[from] LogSinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;
