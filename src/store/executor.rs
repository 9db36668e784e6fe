//! 存储执行器
//!
//! 适配层只负责构造与绑定查询；连接池、重试与退避都在执行器里完成。

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqlitePool};
use sqlx::{Row, Sqlite};

use super::schema::{BoundQuery, Param};
use super::StoreError;
use crate::config::RetrySection;

/// 存储执行接口：读取首列文本 / 执行写入
#[async_trait]
pub trait StoreExecutor: Send + Sync {
    /// 执行只读查询，返回每一行首列的（可空）文本
    async fn fetch_texts(&self, query: &BoundQuery) -> Result<Vec<Option<String>>, StoreError>;

    /// 执行写入，返回受影响行数
    async fn execute(&self, query: &BoundQuery) -> Result<u64, StoreError>;
}

/// 瞬时错误的重试策略（指数退避，封顶 max_delay）
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(section: &RetrySection) -> Self {
        Self {
            max_attempts: section.max_attempts.max(1),
            base_delay: Duration::from_millis(section.base_delay_ms),
            max_delay: Duration::from_millis(section.max_delay_ms),
        }
    }

    /// 第 attempt 次失败后的等待时间（attempt 从 1 开始）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetrySection::default())
    }
}

/// 基于 sqlx SqlitePool 的执行器
pub struct SqliteExecutor {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl SqliteExecutor {
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e) && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(attempt, ?delay, "Transient store error, retrying: {}", e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if is_transient(&e) => {
                    return Err(StoreError::Transient {
                        attempts: attempt,
                        message: e.to_string(),
                    })
                }
                Err(e) => return Err(StoreError::Query(e)),
            }
        }
    }
}

#[async_trait]
impl StoreExecutor for SqliteExecutor {
    async fn fetch_texts(&self, query: &BoundQuery) -> Result<Vec<Option<String>>, StoreError> {
        let pool = &self.pool;
        self.with_retry(|| async move {
            let rows = bind_params(query.sql(), query.params())
                .fetch_all(pool)
                .await?;
            rows.iter()
                .map(|row| row.try_get::<Option<String>, _>(0))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
    }

    async fn execute(&self, query: &BoundQuery) -> Result<u64, StoreError> {
        let pool = &self.pool;
        self.with_retry(|| async move {
            let result = bind_params(query.sql(), query.params())
                .execute(pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await
    }
}

fn bind_params<'q>(
    sql: &'q str,
    params: &'q [Param],
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = match param {
            Param::Int(v) => query.bind(*v),
            Param::Text(s) => query.bind(s.as_str()),
            Param::Null => query.bind(None::<String>),
        };
    }
    query
}

/// 连接池超时、I/O 错误、SQLITE_BUSY / SQLITE_LOCKED（含扩展码）视为瞬时错误
fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, 5 | 6))
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    use super::*;

    /// 单连接文件库；busy_timeout 为 0，锁冲突立即返回 SQLITE_BUSY
    async fn file_pool(path: &Path) -> SqlitePool {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::ZERO);
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap()
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(300),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(300));
        assert_eq!(policy.delay_for(40), Duration::from_millis(300));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        let policy = RetryPolicy::from_config(&RetrySection {
            max_attempts: 0,
            base_delay_ms: 1,
            max_delay_ms: 1,
        });
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        assert!(is_transient(&sqlx::Error::PoolTimedOut));
        assert!(!is_transient(&sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn test_executes_bound_queries() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let executor = SqliteExecutor::new(pool, RetryPolicy::default());

        executor
            .execute(&BoundQuery::new("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)"))
            .await
            .unwrap();
        let affected = executor
            .execute(
                &BoundQuery::new("INSERT INTO t (id, v) VALUES (?, ?), (?, ?)")
                    .bind(Param::Int(1))
                    .bind(Param::Text("a".to_string()))
                    .bind(Param::Int(2))
                    .bind(Param::Null),
            )
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let rows = executor
            .fetch_texts(&BoundQuery::new("SELECT v FROM t ORDER BY id"))
            .await
            .unwrap();
        assert_eq!(rows, vec![Some("a".to_string()), None]);
    }

    #[tokio::test]
    async fn test_locked_database_exhausts_retries() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("locked.db");
        let holder = file_pool(&path).await;
        sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .execute(&holder)
            .await
            .unwrap();
        let executor = SqliteExecutor::new(
            file_pool(&path).await,
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
        );

        let mut lock = holder.acquire().await.unwrap();
        sqlx::query("BEGIN EXCLUSIVE").execute(&mut *lock).await.unwrap();

        let err = executor
            .execute(&BoundQuery::new("INSERT INTO t (id) VALUES (?)").bind(Param::Int(1)))
            .await
            .unwrap_err();
        match err {
            StoreError::Transient { attempts, message } => {
                assert_eq!(attempts, 3);
                assert!(message.contains("locked"), "{message}");
            }
            other => panic!("expected a transient error, got {other:?}"),
        }

        sqlx::query("ROLLBACK").execute(&mut *lock).await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_succeeds_once_lock_is_released() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("busy.db");
        let holder = file_pool(&path).await;
        sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .execute(&holder)
            .await
            .unwrap();
        let executor = SqliteExecutor::new(
            file_pool(&path).await,
            RetryPolicy {
                max_attempts: 6,
                base_delay: Duration::from_millis(20),
                max_delay: Duration::from_millis(200),
            },
        );

        let mut lock = holder.acquire().await.unwrap();
        sqlx::query("BEGIN EXCLUSIVE").execute(&mut *lock).await.unwrap();
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            sqlx::query("COMMIT").execute(&mut *lock).await.unwrap();
        });

        let affected = executor
            .execute(&BoundQuery::new("INSERT INTO t (id) VALUES (?)").bind(Param::Int(1)))
            .await
            .unwrap();
        assert_eq!(affected, 1);
        release.await.unwrap();
    }
}
