//! 核心模块: 配置、错误、后台任务、服务器

pub mod config;
pub mod error;
pub mod server;
pub mod tasks;

pub use config::{Config, Environment, TlsConfig};
pub use error::{ServerError, ServerResult};
pub use server::Server;
pub use tasks::{BackgroundTasks, TaskExit, TaskKind};
