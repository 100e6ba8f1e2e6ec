//! 瞬时数据库错误的重试策略
//!
//! 连接池耗尽、断连、死锁、锁超时以及 SQLite BUSY 被视为瞬时错误，
//! 按指数退避（附加最多 25% 的随机抖动）重新执行整个事务闭包。

use std::future::Future;
use std::time::Duration;

use sea_orm::DbErr;
use sea_orm::error::RuntimeErr;
use sea_orm::sqlx::sqlite::SqliteError;
use tracing::{debug, warn};

use crate::config::StorageConfig;

/// 各数据库表示死锁/锁冲突的错误码
/// MySQL: 1213/1205，PostgreSQL: 40001/40P01
const TRANSIENT_CODES: &[&str] = &["1213", "1205", "40001", "40P01"];

/// SQLite 主错误码 SQLITE_BUSY / SQLITE_LOCKED
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

const TRANSIENT_MESSAGES: &[&str] = &[
    "deadlock",
    "lock wait timeout",
    "database is locked",
    "serialization failure",
];

/// 错误是否值得重试
pub fn is_transient(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(inner) | DbErr::Query(inner) => runtime_is_transient(inner),
        _ => false,
    }
}

fn runtime_is_transient(err: &RuntimeErr) -> bool {
    let message = match err {
        RuntimeErr::SqlxError(sqlx_err) => {
            if let Some(db_err) = sqlx_err.as_database_error() {
                let sqlite = db_err.try_downcast_ref::<SqliteError>().is_some();
                if db_err
                    .code()
                    .is_some_and(|code| code_is_transient(&code, sqlite))
                {
                    return true;
                }
            }
            // 错误码未命中时仍按消息判断
            sqlx_err.to_string()
        }
        RuntimeErr::Internal(msg) => msg.clone(),
        #[allow(unreachable_patterns)]
        _ => return false,
    };

    let message = message.to_lowercase();
    TRANSIENT_MESSAGES.iter().any(|m| message.contains(m))
}

/// 按错误码判断；SQLite 扩展码（如 517 SQLITE_BUSY_SNAPSHOT、262 SQLITE_LOCKED_SHAREDCACHE）
/// 的低 8 位即主错误码
fn code_is_transient(code: &str, sqlite: bool) -> bool {
    if sqlite {
        return code
            .parse::<i64>()
            .is_ok_and(|n| matches!(n & 0xff, SQLITE_BUSY | SQLITE_LOCKED));
    }
    TRANSIENT_CODES.contains(&code)
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 首次执行之外的最大重试次数
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

impl From<&StorageConfig> for RetryPolicy {
    fn from(config: &StorageConfig) -> Self {
        Self {
            max_retries: config.retry_count,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次重试（从 1 开始）前的等待时间，不含抖动
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        let jitter_ms = rand::random_range(0..=delay.as_millis() as u64 / 4);
        delay + Duration::from_millis(jitter_ms)
    }

    /// 执行 `operation`，瞬时错误时按策略重试
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, DbErr>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbErr>>,
    {
        let mut retries = 0;
        loop {
            let err = match operation().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!("{} succeeded after {} retries", label, retries);
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if retries >= self.max_retries || !is_transient(&err) {
                return Err(err);
            }

            retries += 1;
            let delay = self.backoff_with_jitter(retries);
            warn!(
                "{} hit a transient database error ({}), retry {}/{} in {:?}",
                label, err, retries, self.max_retries, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::error::ConnAcquireErr;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&DbErr::ConnectionAcquire(ConnAcquireErr::Timeout)));
        assert!(is_transient(&DbErr::Exec(RuntimeErr::Internal(
            "Deadlock found when trying to get lock".into()
        ))));
        assert!(is_transient(&DbErr::Query(RuntimeErr::Internal(
            "database is locked".into()
        ))));

        assert!(!is_transient(&DbErr::RecordNotFound("x".into())));
        assert!(!is_transient(&DbErr::Exec(RuntimeErr::Internal(
            "syntax error".into()
        ))));
    }

    #[test]
    fn test_error_codes() {
        for code in ["1213", "1205", "40001", "40P01"] {
            assert!(code_is_transient(code, false), "{code} should be transient");
        }
        // SQLITE_BUSY、SQLITE_LOCKED 及其扩展码
        for code in ["5", "6", "261", "262", "517"] {
            assert!(code_is_transient(code, true), "sqlite {code} should be transient");
        }
        // 唯一约束冲突：MySQL 1062、PostgreSQL 23505、SQLite 2067
        assert!(!code_is_transient("1062", false));
        assert!(!code_is_transient("23505", false));
        assert!(!code_is_transient("2067", true));
        assert!(!code_is_transient("1", true));
        // 同样的数字在 MySQL 上不是锁冲突
        assert!(!code_is_transient("1029", false));
    }

    #[test]
    fn test_backoff_doubles_until_cap() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(5), Duration::from_millis(1000));
        assert_eq!(policy.backoff(64), Duration::from_millis(1000));
    }

    #[test]
    fn test_policy_from_storage_config() {
        let storage = StorageConfig {
            retry_count: 5,
            retry_base_delay_ms: 20,
            retry_max_delay_ms: 400,
            ..Default::default()
        };
        let policy = RetryPolicy::from(&storage);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(20));
        assert_eq!(policy.max_delay, Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_run_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("flaky", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_gives_up() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(2)
            .run("down", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout)) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(5)
            .run("missing", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(DbErr::RecordNotFound("gone".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
