//! 存储上下文
//!
//! 进程启动时构造一次（连接池 + 执行器 + 表结构），此后在所有调用之间复用，
//! 显式传给 StateStore / UserDirectory，而不是作为隐式全局单例。

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use super::executor::{RetryPolicy, SqliteExecutor, StoreExecutor};
use super::schema::{BoundQuery, TableSchema};
use super::users::UserDirectory;
use super::{StateStore, StoreError};
use crate::config::StoreSection;
use crate::core::EngineError;

pub struct StoreContext {
    executor: Arc<SqliteExecutor>,
    schema: TableSchema,
}

impl StoreContext {
    /// 建立连接池；配置了 create_schema 时确保用户表存在
    pub async fn connect(section: &StoreSection) -> Result<Self, EngineError> {
        let schema = TableSchema::from_config(&section.columns)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(section.max_connections)
            .acquire_timeout(Duration::from_secs(section.acquire_timeout_secs))
            .connect(&section.database_url)
            .await
            .map_err(|e| EngineError::Store(format!("failed to connect store: {e}")))?;

        let context = Self {
            executor: Arc::new(SqliteExecutor::new(
                pool,
                RetryPolicy::from_config(&section.retry),
            )),
            schema,
        };

        if section.create_schema {
            context.ensure_schema().await?;
        }

        tracing::info!(
            "Store context ready: table={}, max_connections={}",
            context.schema.table(),
            section.max_connections
        );
        Ok(context)
    }

    pub fn executor(&self) -> Arc<dyn StoreExecutor> {
        self.executor.clone()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn state_store(&self) -> StateStore {
        StateStore::new(self.executor(), self.schema.clone())
    }

    pub fn user_directory(&self) -> UserDirectory {
        UserDirectory::new(self.executor(), self.schema.clone())
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.executor
            .execute(&BoundQuery::new(self.schema.create_table_sql()))
            .await?;
        Ok(())
    }

    /// 关闭连接池
    pub async fn close(&self) {
        self.executor.pool().close().await;
    }
}
