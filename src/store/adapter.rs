//! 状态文档读写适配器
//!
//! 每个事件：一次 fetch（单条参数化 SELECT），至多一次 commit（单条参数化写入）。

use std::sync::Arc;

use super::executor::StoreExecutor;
use super::schema::TableSchema;
use super::{StoreError, UserId};

/// 读取结果：行不存在 与 行存在但文档为 NULL 是两种不同情况
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredBlob {
    NotFound,
    Null,
    Document(String),
}

/// 按用户读写状态文档列
#[derive(Clone)]
pub struct StateStore {
    executor: Arc<dyn StoreExecutor>,
    schema: TableSchema,
}

impl StateStore {
    pub fn new(executor: Arc<dyn StoreExecutor>, schema: TableSchema) -> Self {
        Self { executor, schema }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// 读取用户的状态文档；多于一行视为完整性错误，不重试
    pub async fn fetch(&self, user_id: UserId) -> Result<StoredBlob, StoreError> {
        let query = self.schema.select_document(user_id)?;
        let mut rows = self.executor.fetch_texts(&query).await?;

        match rows.len() {
            0 => Ok(StoredBlob::NotFound),
            1 => Ok(match rows.pop().flatten() {
                Some(document) => StoredBlob::Document(document),
                None => StoredBlob::Null,
            }),
            n => Err(StoreError::Integrity {
                table: self.schema.table().to_string(),
                user_id,
                rows: n,
            }),
        }
    }

    /// 写入：Some 整体覆盖文档（必要时建行），None 擦除文档及派生列
    pub async fn commit(&self, user_id: UserId, document: Option<&str>) -> Result<(), StoreError> {
        let query = match document {
            Some(doc) => self.schema.upsert_document(user_id, doc)?,
            None => self.schema.wipe_document(user_id)?,
        };
        let affected = self.executor.execute(&query).await?;
        tracing::debug!(user_id, affected, wipe = document.is_none(), "State committed");
        Ok(())
    }
}
