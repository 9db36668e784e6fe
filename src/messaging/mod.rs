//! 出站消息
//!
//! - **outbound**: 消息、按钮、回复目标等纯数据类型
//! - **telegram**: 基于 reqwest 的 Bot API 客户端（Messenger + Notifier）

pub mod outbound;
pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

pub use outbound::{
    clip, clip_escaped, escape_html, utf16_len, Button, CallbackOrigin, MediaKind, OutboundMedia, OutboundMessage,
    ParseMode, ReplyTarget, MAX_CAPTION_LENGTH, MAX_MESSAGE_LENGTH,
};
pub use telegram::TelegramClient;

/// 投递失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// 编辑后的内容与原消息相同
    #[error("Message is not modified")]
    NotModified,

    /// 回调过期、原消息已不存在或不可编辑
    #[error("Stale reference: {0}")]
    StaleReference(String),

    #[error("Timed out")]
    Timeout,

    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl DeliveryError {
    /// 可忽略的失败只记录日志，不触发 Faulted
    pub fn is_ignorable(&self) -> bool {
        matches!(
            self,
            DeliveryError::NotModified | DeliveryError::StaleReference(_) | DeliveryError::Timeout
        )
    }
}

/// 面向用户的出站投递
#[async_trait]
pub trait Messenger: Send + Sync {
    /// 回复当前事件：回调事件时优先编辑原消息
    async fn deliver(&self, target: &ReplyTarget, message: &OutboundMessage) -> Result<(), DeliveryError>;

    /// 向任意 chat 发送新消息（如公告频道）
    async fn send(&self, chat_id: i64, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// 开发者告警，尽力而为，失败只记录日志
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, html: &str);
}
