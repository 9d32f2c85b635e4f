use crate::core::error::ServerError;
use bazaar_log::{LogSinkConfig, QueueCapacity};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 运行环境
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// TLS 证书配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// 证书热加载检查间隔
    pub refresh_interval: Duration,
}

/// 服务器配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | HOST | 0.0.0.0 | 监听地址 |
/// | PORT | 8080 | 监听端口 (443 表示生产环境) |
/// | ENVIRONMENT | 由端口推断 | development / production |
/// | TLS_CERT_FILE_PATH | - | 证书 PEM (生产环境必填) |
/// | TLS_KEY_FILE_PATH | - | 私钥 PEM (生产环境必填) |
/// | TLS_REFRESH_INTERVAL_SECS | 60 | 证书检查间隔 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | - | 日志目录 (按天滚动) |
/// | LOG_BUFFER_THRESHOLD | 1024 | 日志缓冲刷新阈值 (字节) |
/// | LOG_QUEUE_CAPACITY | 0 | 日志队列容量, 或 `unbounded` |
/// | LOG_DRAIN_TIMEOUT_MS | 5000 | 日志关闭等待上限 |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | HTTP 优雅关闭超时 |
///
/// # 示例
///
/// ```ignore
/// PORT=443 TLS_CERT_FILE_PATH=/etc/bazaar/cert.pem TLS_KEY_FILE_PATH=/etc/bazaar/key.pem cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub environment: Environment,
    /// `None` 时以明文 HTTP 运行 (仅开发环境)
    pub tls: Option<TlsConfig>,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub log_sink: LogSinkConfig,
    pub shutdown_timeout: Duration,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载配置
    ///
    /// 常用于测试场景，避免修改进程环境变量。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = parse_or(&get, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port = parse_or(&get, "PORT", 8080u16)?;
        let environment = match get("ENVIRONMENT") {
            Some(v) => v.parse().map_err(ServerError::Config)?,
            None if port == 443 => Environment::Production,
            None => Environment::Development,
        };

        let cert_path = get("TLS_CERT_FILE_PATH");
        let key_path = get("TLS_KEY_FILE_PATH");
        let refresh_secs = parse_or(&get, "TLS_REFRESH_INTERVAL_SECS", 60u64)?;
        if refresh_secs == 0 {
            return Err(ServerError::Config(
                "TLS_REFRESH_INTERVAL_SECS must be greater than 0".into(),
            ));
        }

        let tls = match (cert_path, key_path) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: cert.into(),
                key_path: key.into(),
                refresh_interval: Duration::from_secs(refresh_secs),
            }),
            (cert, key) => {
                if environment == Environment::Production {
                    let mut missing = Vec::new();
                    if cert.is_none() {
                        missing.push("TLS_CERT_FILE_PATH");
                    }
                    if key.is_none() {
                        missing.push("TLS_KEY_FILE_PATH");
                    }
                    return Err(ServerError::Config(format!(
                        "missing environment variables: {:?}",
                        missing
                    )));
                }
                None
            }
        };

        let log_sink = LogSinkConfig::default()
            .with_buffer_threshold(parse_or(
                &get,
                "LOG_BUFFER_THRESHOLD",
                bazaar_log::DEFAULT_BUFFER_THRESHOLD,
            )?)
            .with_queue(parse_or(&get, "LOG_QUEUE_CAPACITY", QueueCapacity::default())?)
            .with_drain_timeout(Duration::from_millis(parse_or(
                &get,
                "LOG_DRAIN_TIMEOUT_MS",
                bazaar_log::DEFAULT_DRAIN_TIMEOUT.as_millis() as u64,
            )?));

        Ok(Self {
            host,
            port,
            environment,
            tls,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_dir: get("LOG_DIR"),
            log_sink,
            shutdown_timeout: Duration::from_millis(parse_or(
                &get,
                "SHUTDOWN_TIMEOUT_MS",
                10_000u64,
            )?),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ServerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid {}='{}': {}", key, raw, e))),
        None => Ok(default),
    }
}
