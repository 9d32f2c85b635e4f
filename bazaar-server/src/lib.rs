//! Bazaar Server - HTTPS 服务入口
//!
//! # 模块结构
//!
//! ```text
//! bazaar-server/src/
//! ├── core/          # 配置、错误、后台任务、服务器
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 日志初始化
//! ```
//!
//! 证书热加载见 `bazaar-cert`，异步日志见 `bazaar-log`。

pub mod api;
pub mod core;
pub mod utils;

pub use core::{Config, Environment, Server, ServerError, ServerResult, TlsConfig};
pub use utils::init_logger;
