//! Engine 构建器：统一的引擎初始化逻辑
//!
//! 单次调用入口与 Webhook 服务共用同一套组装方式；测试可替换存储执行器与消息投递。

use std::sync::Arc;

use super::engine::Engine;
use super::EngineError;
use crate::messaging::{Messenger, Notifier, TelegramClient};
use crate::persistence::Persistence;
use crate::router::Dispatcher;
use crate::store::{StateStore, StoreContext, StoreExecutor, TableSchema, UserDirectory};

const DEFAULT_APOLOGY: &str = "Something went wrong, the admin has been notified.";

/// Engine 构建器：配置和组装引擎的各个协作者
pub struct EngineBuilder {
    dispatcher: Option<Dispatcher>,
    store: Option<(StateStore, UserDirectory)>,
    messenger: Option<Arc<dyn Messenger>>,
    notifier: Option<Arc<dyn Notifier>>,
    apology: String,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            dispatcher: None,
            store: None,
            messenger: None,
            notifier: None,
            apology: DEFAULT_APOLOGY.to_string(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// 使用进程级存储上下文（连接池在所有调用之间复用）
    pub fn with_store_context(mut self, context: &StoreContext) -> Self {
        self.store = Some((context.state_store(), context.user_directory()));
        self
    }

    /// 直接指定执行器（测试中用于计数 / 注入故障）
    pub fn with_store(mut self, executor: Arc<dyn StoreExecutor>, schema: TableSchema) -> Self {
        self.store = Some((
            StateStore::new(executor.clone(), schema.clone()),
            UserDirectory::new(executor, schema),
        ));
        self
    }

    pub fn with_messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 同一个 Bot API 客户端同时负责用户回复与开发者告警
    pub fn with_telegram(self, client: Arc<TelegramClient>) -> Self {
        self.with_messenger(client.clone()).with_notifier(client)
    }

    /// Faulted 时发给用户的道歉文案
    pub fn with_apology(mut self, text: &str) -> Self {
        self.apology = text.to_string();
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        let missing = |what: &str| EngineError::Configuration(format!("engine {what} is not set"));

        let dispatcher = self.dispatcher.ok_or_else(|| missing("dispatcher"))?;
        let (store, directory) = self.store.ok_or_else(|| missing("store"))?;
        let messenger = self.messenger.ok_or_else(|| missing("messenger"))?;
        let notifier = self.notifier.ok_or_else(|| missing("notifier"))?;

        tracing::info!(
            "Engine ready: conversations=[{}]",
            dispatcher.conversation_names().collect::<Vec<_>>().join(", ")
        );

        Ok(Engine {
            dispatcher: Arc::new(dispatcher),
            persistence: Persistence::new(store),
            directory,
            messenger,
            notifier,
            apology: self.apology,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parts_are_configuration_errors() {
        let err = EngineBuilder::new()
            .with_dispatcher(Dispatcher::new())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Configuration(ref m) if m.contains("store")));
    }
}
