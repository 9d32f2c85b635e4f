//! HTTP API
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /ping | GET | 存活检查, 返回 `pong` |

pub mod health;

use axum::{Router, middleware};

/// HTTP 请求日志中间件
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::info!(target: "http_access", "{} {} {}", method, uri, response.status());

    response
}

/// 构建完整的 Axum 路由
pub fn build_app() -> Router {
    Router::new()
        .merge(health::router())
        .layer(middleware::from_fn(log_request))
}
