//! 调用上下文：截止时间 + 协作式取消
//!
//! 每个网络/存储调用都经 [`CallContext::run`] 执行，超时返回
//! [`WalletError::Timeout`]，取消返回 [`WalletError::Cancelled`]。

use std::{future::Future, time::Duration};

use tokio::{sync::watch, time::Instant};

use crate::error::{Result, WalletError};

/// 默认超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Instant,
    cancel: watch::Receiver<bool>,
}

/// 取消句柄，drop 不会触发取消
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl CallContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        let (_tx, rx) = watch::channel(false);
        Self {
            deadline: Instant::now() + timeout,
            cancel: rx,
        }
    }

    /// 创建可取消的上下文
    pub fn cancellable(timeout: Duration) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                deadline: Instant::now() + timeout,
                cancel: rx,
            },
            CancelHandle { tx },
        )
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// 在截止时间与取消信号约束下执行 `fut`
    pub async fn run<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(WalletError::Cancelled);
        }

        let mut cancel = self.cancel.clone();
        tokio::select! {
            res = tokio::time::timeout_at(self.deadline, fut) => match res {
                Ok(inner) => inner,
                Err(_) => {
                    tracing::warn!(operation = %what, "call deadline exceeded");
                    Err(WalletError::Timeout(what.to_string()))
                }
            },
            _ = wait_cancelled(&mut cancel) => {
                tracing::debug!(operation = %what, "call cancelled");
                Err(WalletError::Cancelled)
            }
        }
    }
}

async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // 发送端已释放，不会再有取消信号
            std::future::pending::<()>().await;
        }
    }
}
