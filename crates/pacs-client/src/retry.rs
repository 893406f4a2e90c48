//! 有上限的重试策略

use pacs_core::{PacsError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 重试策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 最大尝试次数（含第一次）
    pub max_attempts: u32,
    /// 两次尝试之间的间隔（毫秒）
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 500,
        }
    }
}

/// 一次失败之后的处理方式
#[derive(Debug)]
pub enum RetryStep {
    /// 等待 `delay` 后重试
    Retry(PacsError),
    /// 放弃，返回最终错误
    GiveUp(PacsError),
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// 不重试，只尝试一次
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// 实际生效的最大尝试次数，至少为1
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// 第 `attempt` 次尝试失败后的下一步
    ///
    /// 不可重试的错误原样放弃；次数用尽时放弃并包装为 `RetriesExhausted`。
    pub fn next_step(&self, attempt: u32, err: PacsError) -> RetryStep {
        if !err.is_retryable() {
            RetryStep::GiveUp(err)
        } else if attempt >= self.attempts() {
            RetryStep::GiveUp(PacsError::RetriesExhausted {
                attempts: attempt,
                last_error: Box::new(err),
            })
        } else {
            RetryStep::Retry(err)
        }
    }

    /// 执行操作，可重试的错误最多尝试 `max_attempts` 次
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;

        loop {
            debug!("{}: 第 {}/{} 次尝试", operation, attempt, self.attempts());

            let err = match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{}: 第 {} 次尝试成功", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            match self.next_step(attempt, err) {
                RetryStep::Retry(e) => {
                    warn!("{}: 第 {} 次尝试失败: {}，{:?} 后重试", operation, attempt, e, self.delay());
                    tokio::time::sleep(self.delay()).await;
                    attempt += 1;
                }
                RetryStep::GiveUp(e) => {
                    warn!("{}: 放弃: {}", operation, e);
                    return Err(e);
                }
            }
        }
    }
}
