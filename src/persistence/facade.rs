//! 持久化门面：加载工作状态、序列化、按决策写回

use crate::core::EngineError;
use crate::store::{StateStore, StoredBlob, UserId};

use super::document::StateDocument;
use super::working::WorkingState;

/// 一次事件结束时的写回决策
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveDecision {
    /// 状态未变化，不发写入
    Skip,
    /// 用给定文档整体覆盖
    Write(String),
    /// 擦除文档（及派生列）
    Wipe,
}

#[derive(Clone)]
pub struct Persistence {
    store: StateStore,
}

impl Persistence {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// 读取并解析；行不存在或文档为 NULL 时得到空状态
    pub async fn load(&self, user_id: UserId) -> Result<WorkingState, EngineError> {
        match self.store.fetch(user_id).await? {
            StoredBlob::NotFound | StoredBlob::Null => Ok(WorkingState::new()),
            StoredBlob::Document(raw) => {
                let document = StateDocument::parse(&raw)?;
                let canonical = document.to_json()?;
                Ok(WorkingState::from_document(document, Some(canonical)))
            }
        }
    }

    pub fn serialize(&self, state: &WorkingState) -> Result<String, EngineError> {
        Ok(state.to_document().to_json()?)
    }

    pub async fn save(&self, user_id: UserId, decision: SaveDecision) -> Result<(), EngineError> {
        match decision {
            SaveDecision::Skip => {
                tracing::debug!(user_id, "State unchanged, skipping write");
            }
            SaveDecision::Write(document) => self.store.commit(user_id, Some(&document)).await?,
            SaveDecision::Wipe => self.store.commit(user_id, None).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SqliteExecutor, RetryPolicy, TableSchema};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn persistence() -> Persistence {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let executor = Arc::new(SqliteExecutor::new(pool, RetryPolicy::default()));
        let schema = TableSchema::new("users", "user_id", "persistence_data").unwrap();
        let ddl = crate::store::BoundQuery::new(schema.create_table_sql());
        crate::store::StoreExecutor::execute(executor.as_ref(), &ddl)
            .await
            .unwrap();
        Persistence::new(StateStore::new(executor, schema))
    }

    #[tokio::test]
    async fn test_load_missing_user_is_empty() {
        let p = persistence().await;
        let state = p.load(77).await.unwrap();
        assert!(state.scratch().is_empty());
        assert!(state.conversations().is_empty());
        assert_eq!(state.snapshot(), None);
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let p = persistence().await;
        let raw = r#"{"conversations":{"C":"A"},"scratch":{"draft":"hi"}}"#;
        p.save(5, SaveDecision::Write(raw.to_string())).await.unwrap();

        let state = p.load(5).await.unwrap();
        assert_eq!(state.conversation("C"), Some("A"));
        assert_eq!(state.get_str("draft"), Some("hi"));
        assert_eq!(p.serialize(&state).unwrap(), raw);
        assert!(state.is_unchanged(raw));

        p.save(5, SaveDecision::Wipe).await.unwrap();
        let state = p.load(5).await.unwrap();
        assert!(state.conversations().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_document_error() {
        let p = persistence().await;
        p.save(6, SaveDecision::Write("{broken".to_string())).await.unwrap();
        let err = p.load(6).await.unwrap_err();
        assert!(matches!(err, EngineError::Document(_)));
    }
}
