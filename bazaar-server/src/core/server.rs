//! HTTP(S) 服务器
//!
//! 开发环境以明文 HTTP 运行；配置了证书时以 TLS 运行，证书由
//! [`CertificateCache`] 提供并在后台定时热加载。

use crate::core::{BackgroundTasks, Config, ServerError, ServerResult, TaskKind};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use bazaar_cert::{CertificateCache, server_config};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// ALPN 协议 (优先 HTTP/2)
const ALPN_PROTOCOLS: &[&[u8]] = &[b"h2", b"http/1.1"];

pub struct Server {
    config: Config,
    handle: Handle<SocketAddr>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            handle: Handle::new(),
        }
    }

    /// 服务器句柄，可用于获取实际监听地址或主动关闭
    pub fn handle(&self) -> Handle<SocketAddr> {
        self.handle.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 运行直到收到 Ctrl+C / SIGTERM
    pub async fn run(self) -> ServerResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// 运行直到 `signal` 完成，然后优雅关闭
    pub async fn run_until<F>(self, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.socket_addr();

        // 证书必须在监听之前可用，失败直接退出
        let cache = match &self.config.tls {
            Some(tls) => {
                let cache = Arc::new(CertificateCache::load(&tls.cert_path, &tls.key_path)?);
                Some((cache, tls.refresh_interval))
            }
            None => None,
        };

        let mut tasks = BackgroundTasks::new();

        let handle = self.handle.clone();
        let grace = self.config.shutdown_timeout;
        let token = tasks.shutdown_token();
        tasks.spawn("shutdown_listener", TaskKind::Listener, async move {
            tokio::select! {
                _ = signal => {
                    handle.graceful_shutdown(Some(grace));
                    token.cancelled().await;
                }
                _ = token.cancelled() => {}
            }
        });

        let app = crate::api::build_app();

        let result = match cache {
            Some((cache, interval)) => {
                let token = tasks.shutdown_token();
                tasks.spawn(
                    "cert_watcher",
                    TaskKind::Periodic,
                    Arc::clone(&cache).run_watch(interval, token),
                );

                match server_config(cache, ALPN_PROTOCOLS) {
                    Ok(tls_config) => {
                        tracing::info!("🚀 Starting HTTPS server on {}", addr);
                        axum_server::bind_rustls(addr, RustlsConfig::from_config(tls_config))
                            .handle(self.handle.clone())
                            .serve(app.into_make_service())
                            .await
                            .map_err(ServerError::from)
                    }
                    Err(e) => Err(e.into()),
                }
            }
            None => {
                if self.config.is_production() {
                    tracing::warn!("Running production without TLS");
                }
                tracing::info!("🚀 Starting HTTP server on {}", addr);
                axum_server::bind(addr)
                    .handle(self.handle.clone())
                    .serve(app.into_make_service())
                    .await
                    .map_err(ServerError::from)
            }
        };

        tasks.shutdown(self.config.shutdown_timeout).await;

        match &result {
            Ok(()) => tracing::info!("✅ Server shutdown complete"),
            Err(e) => tracing::error!(error = %e, "Server stopped with error"),
        }
        result
    }
}

/// 等待 Ctrl+C 或 SIGTERM
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
