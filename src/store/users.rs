//! 用户目录：注册资料与使用计数
//!
//! 与状态文档共用用户表的同一行，但属于另一子系统，不计入状态文档的“一读一写”。

use std::sync::Arc;

use super::executor::StoreExecutor;
use super::schema::TableSchema;
use super::{StoreError, UserId};

#[derive(Clone)]
pub struct UserDirectory {
    executor: Arc<dyn StoreExecutor>,
    schema: TableSchema,
}

impl UserDirectory {
    pub fn new(executor: Arc<dyn StoreExecutor>, schema: TableSchema) -> Self {
        Self { executor, schema }
    }

    /// 新用户建行；已存在时刷新名字，缺失的可选字段保留旧值
    pub async fn register(
        &self,
        user_id: UserId,
        first_name: &str,
        last_name: Option<&str>,
        username: Option<&str>,
    ) -> Result<(), StoreError> {
        let query = self
            .schema
            .upsert_user(user_id, first_name, last_name, username)?;
        self.executor.execute(&query).await?;
        Ok(())
    }

    /// 使用次数 +1（行不存在时不做任何事）
    pub async fn increment_usage(&self, user_id: UserId) -> Result<(), StoreError> {
        let query = self.schema.increment_usage(user_id)?;
        self.executor.execute(&query).await?;
        Ok(())
    }
}
