//! 引擎错误类型
//!
//! 与 Engine 配合：Configuration / Integrity / Store 直接向上传播；
//! TransientStore（加载阶段）、Document、HandlerFault 降级为 Faulted 覆盖路径（擦除记录）。

use thiserror::Error;

use crate::store::StoreError;

/// 单次事件处理中可能出现的错误
#[derive(Error, Debug)]
pub enum EngineError {
    /// 启动期配置错误（会话标志、标识符、缺失的入口/回退路由等）
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 同一用户存在多行记录，不可重试
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// 连接/超时，执行器重试耗尽后上报
    #[error("Transient store error: {0}")]
    TransientStore(String),

    #[error("Store error: {0}")]
    Store(String),

    /// 存储的文档不是合法 JSON 对象
    #[error("Document error: {0}")]
    Document(#[from] serde_json::Error),

    #[error(transparent)]
    HandlerFault(#[from] HandlerFault),
}

impl EngineError {
    /// 是否应降级为 Faulted 路径（而不是直接向上传播）
    pub fn degrades_to_fault(&self) -> bool {
        matches!(
            self,
            EngineError::TransientStore(_) | EngineError::Document(_) | EngineError::HandlerFault(_)
        )
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Integrity { .. } => EngineError::Integrity(err.to_string()),
            StoreError::Transient { .. } => EngineError::TransientStore(err.to_string()),
            StoreError::InvalidIdentifier(_) | StoreError::IdentityOutOfRange(_) => {
                EngineError::Configuration(err.to_string())
            }
            StoreError::Query(e) => EngineError::Store(e.to_string()),
        }
    }
}

/// 处理器未恢复的失败（返回的错误或 panic）
#[derive(Error, Debug, Clone)]
#[error("Handler '{handler}' failed: {message}")]
pub struct HandlerFault {
    pub handler: String,
    pub message: String,
}

impl HandlerFault {
    pub fn new(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            message: message.into(),
        }
    }
}
