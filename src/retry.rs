// 有界重试
// 等待新启动节点的 SSH、重跑因 dpkg 锁失败的命令等轮询场景都走这里

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// 重试错误类型
#[derive(Debug, Error)]
pub enum RetryError {
    /// 超时仍未成功，携带最后一次错误
    #[error("{operation} did not succeed within {timeout:?} ({attempts} attempts over {elapsed:?}): {last_error}")]
    Exhausted {
        operation: String,
        attempts: u32,
        elapsed: Duration,
        timeout: Duration,
        last_error: String,
    },
}

/// 重试策略
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// 总时限，从第一次尝试开始计算
    pub timeout: Duration,
    /// 第一次失败后的等待间隔
    pub interval: Duration,
    /// 每次失败后间隔的倍数（1.0 表示固定间隔）
    pub backoff_multiplier: f64,
    /// 间隔上限
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            interval: Duration::from_secs(2),
            backoff_multiplier: 1.5,
            max_interval: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// 固定间隔的策略
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            backoff_multiplier: 1.0,
            max_interval: interval,
        }
    }

    /// 设置退避倍数
    pub fn backoff(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        if self.max_interval < self.interval {
            self.max_interval = self.interval;
        }
        self
    }

    /// 设置间隔上限
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        let next = Duration::from_secs_f64(current.as_secs_f64() * self.backoff_multiplier);
        next.min(self.max_interval.max(self.interval))
    }
}

/// 重复执行 `operation` 直到返回 `Ok` 或超过策略时限
///
/// 放弃时最后一次错误以文本形式放在 [`RetryError::Exhausted`] 中。
pub async fn retry_until<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut interval = policy.interval;

    loop {
        attempts += 1;

        let last_error = match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(
                        "[Retry] {} succeeded after {} attempts",
                        operation_name, attempts
                    );
                }
                return Ok(value);
            }
            Err(e) => e.to_string(),
        };

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            warn!(
                "[Retry] {} gave up after {} attempts: {}",
                operation_name, attempts, last_error
            );
            return Err(RetryError::Exhausted {
                operation: operation_name.to_string(),
                attempts,
                elapsed,
                timeout: policy.timeout,
                last_error,
            });
        }

        debug!(
            "[Retry] {} attempt {} failed, retrying in {:?}: {}",
            operation_name, attempts, interval, last_error
        );

        // 等待不超过截止时间
        sleep(interval.min(policy.timeout - elapsed)).await;
        interval = policy.next_interval(interval);
    }
}

/// 轮询 `condition` 直到返回 true 或超过策略时限
pub async fn wait_for<F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut condition: F,
) -> Result<(), RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    retry_until(policy, operation_name, || {
        let check = condition();
        async move {
            if check.await {
                Ok(())
            } else {
                Err("condition returned false")
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_succeeds_immediately() {
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_millis(100));
        let result: Result<u32, RetryError> =
            retry_until(&policy, "immediate", || async { Ok::<_, String>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_succeeds_after_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(Duration::from_secs(10), Duration::from_millis(100));

        let c = counter.clone();
        let result = retry_until(&policy, "flaky", move || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err("dpkg lock held")
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_times_out_with_last_error() {
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_millis(300));
        let result: Result<(), RetryError> =
            retry_until(&policy, "never", || async { Err::<(), _>("connection refused") }).await;

        match result {
            Err(RetryError::Exhausted {
                operation,
                attempts,
                last_error,
                ..
            }) => {
                assert_eq!(operation, "never");
                // t=0, 0.3, 0.6, 0.9, 1.0
                assert_eq!(attempts, 5);
                assert_eq!(last_error, "connection refused");
            }
            Ok(_) => panic!("expected timeout"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_condition() {
        let counter = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(Duration::from_secs(5), Duration::from_millis(50));

        let c = counter.clone();
        let result = wait_for(&policy, "counter", move || {
            let c = c.clone();
            async move { c.fetch_add(1, Ordering::SeqCst) >= 2 }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_timeout() {
        let policy = RetryPolicy::new(Duration::from_millis(200), Duration::from_millis(50));
        let result = wait_for(&policy, "always false", || async { false }).await;
        let message = result.unwrap_err().to_string();
        assert!(message.starts_with("always false did not succeed within 200ms"));
        assert!(message.ends_with("condition returned false"));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(Duration::from_secs(60), Duration::from_secs(2))
            .backoff(2.0)
            .max_interval(Duration::from_secs(5));
        assert_eq!(
            policy.next_interval(Duration::from_secs(2)),
            Duration::from_secs(4)
        );
        assert_eq!(
            policy.next_interval(Duration::from_secs(4)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_fixed_interval() {
        let policy = RetryPolicy::new(Duration::from_secs(60), Duration::from_secs(3));
        assert_eq!(
            policy.next_interval(Duration::from_secs(3)),
            Duration::from_secs(3)
        );
    }
}
