//! 存活检查路由 (无需认证)

use axum::{Router, routing::get};

pub fn router() -> Router {
    Router::new().route("/ping", get(ping))
}

async fn ping() -> &'static str {
    "pong"
}
