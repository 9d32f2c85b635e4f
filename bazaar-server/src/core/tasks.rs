//! 后台任务
//!
//! 服务器运行期间的长期任务 (关闭信号监听、证书热加载) 都注册在
//! [`BackgroundTasks`] 中，共享同一个 [`CancellationToken`]。

use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// 等待外部事件 (信号)
    Listener,
    /// 按固定间隔执行
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Listener => "listener",
            TaskKind::Periodic => "periodic",
        })
    }
}

/// 任务退出方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskExit {
    /// 取消后正常退出
    Cancelled,
    /// 未取消就返回了
    Returned,
    Panicked(String),
}

pub struct BackgroundTasks {
    set: JoinSet<(&'static str, TaskExit)>,
    token: CancellationToken,
    running: Arc<AtomicUsize>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            set: JoinSet::new(),
            token: CancellationToken::new(),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 任务内部用于监听关闭
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 启动任务。panic 会被捕获并记录，不会影响其他任务。
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        let running = Arc::clone(&self.running);
        running.fetch_add(1, Ordering::SeqCst);

        self.set.spawn(async move {
            let exit = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) if token.is_cancelled() => TaskExit::Cancelled,
                Ok(()) => TaskExit::Returned,
                Err(payload) => TaskExit::Panicked(panic_message(payload.as_ref())),
            };
            running.fetch_sub(1, Ordering::SeqCst);

            match &exit {
                TaskExit::Cancelled => tracing::debug!(task = name, %kind, "Background task stopped"),
                TaskExit::Returned => {
                    tracing::warn!(task = name, %kind, "Background task exited before shutdown")
                }
                TaskExit::Panicked(msg) => {
                    tracing::error!(task = name, %kind, panic = %msg, "Background task panicked")
                }
            }
            (name, exit)
        });

        tracing::debug!(task = name, %kind, "Background task started");
    }

    /// 已注册的任务数 (含已退出但未回收的)
    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// 仍在运行的任务数
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// 取消所有任务并回收，总等待不超过 `timeout`，之后剩余任务被 abort。
    ///
    /// 返回每个任务的退出方式 (按完成顺序)。
    pub async fn shutdown(mut self, timeout: Duration) -> Vec<(&'static str, TaskExit)> {
        tracing::info!(count = self.set.len(), "Stopping background tasks");
        self.token.cancel();

        let mut exits = Vec::with_capacity(self.set.len());
        let drained = tokio::time::timeout(timeout, async {
            while let Some(joined) = self.set.join_next().await {
                match joined {
                    Ok(exit) => exits.push(exit),
                    Err(e) => tracing::error!(error = %e, "Background task join failed"),
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = self.set.len(),
                "Background tasks did not stop in time, aborting"
            );
            self.set.abort_all();
        }

        exits
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
