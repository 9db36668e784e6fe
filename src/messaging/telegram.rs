//! Telegram Bot API 客户端
//!
//! 回复语义（reply-or-edit）：
//! - 普通消息事件：直接发送新消息
//! - 回调事件：先 answerCallbackQuery；同类型（文本↔文本、媒体↔媒体）则编辑原消息，
//!   编辑失败（非 not-modified / 超时）时退回发送新消息；类型变化时删除原消息再发送

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::outbound::{CallbackOrigin, OutboundMessage, ReplyTarget};
use super::{DeliveryError, Messenger, Notifier};
use crate::config::TelegramSection;
use crate::core::EngineError;

/// Bot API 统一响应
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    developer_chat_id: Option<i64>,
}

impl TelegramClient {
    pub fn new(section: &TelegramSection) -> Result<Self, EngineError> {
        let token = section
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EngineError::Configuration("telegram.token is not set".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(section.request_timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{}", section.api_base.trim_end_matches('/'), token),
            developer_chat_id: section.developer_chat_id,
        })
    }

    async fn call(&self, method: &str, payload: Value) -> Result<(), DeliveryError> {
        let url = format!("{}/{}", self.base_url, method);
        let resp = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let body: ApiResponse = resp.json().await.map_err(transport_error)?;
        if body.ok {
            return Ok(());
        }
        Err(classify_api_error(
            body.error_code.unwrap_or_default(),
            body.description.unwrap_or_default(),
        ))
    }

    async fn send_new(&self, chat_id: i64, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let mut payload = Map::new();
        payload.insert("chat_id".into(), json!(chat_id));

        let method = match &message.media {
            None => {
                payload.insert("text".into(), json!(message.clipped_text()));
                if message.disable_preview {
                    payload.insert("disable_web_page_preview".into(), json!(true));
                }
                "sendMessage"
            }
            Some(media) => {
                let (method, field) = media.kind.send_method();
                payload.insert(field.into(), json!(media.file_id));
                if !message.text.is_empty() {
                    payload.insert("caption".into(), json!(message.clipped_text()));
                }
                method
            }
        };
        decorate(&mut payload, message);

        self.call(method, Value::Object(payload)).await
    }

    async fn edit(&self, chat_id: i64, origin: &CallbackOrigin, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let mut payload = Map::new();
        payload.insert("chat_id".into(), json!(chat_id));
        payload.insert("message_id".into(), json!(origin.message_id));

        let method = match &message.media {
            None => {
                payload.insert("text".into(), json!(message.clipped_text()));
                if message.disable_preview {
                    payload.insert("disable_web_page_preview".into(), json!(true));
                }
                decorate(&mut payload, message);
                "editMessageText"
            }
            Some(media) => {
                let mut input = Map::new();
                input.insert("type".into(), json!(media.kind.input_media_type()));
                input.insert("media".into(), json!(media.file_id));
                if !message.text.is_empty() {
                    input.insert("caption".into(), json!(message.clipped_text()));
                }
                if let Some(mode) = message.parse_mode {
                    input.insert("parse_mode".into(), json!(mode.as_str()));
                }
                payload.insert("media".into(), Value::Object(input));
                if let Some(markup) = message.reply_markup() {
                    payload.insert("reply_markup".into(), markup);
                }
                "editMessageMedia"
            }
        };

        self.call(method, Value::Object(payload)).await
    }

    async fn answer_callback(&self, query_id: &str) {
        if let Err(e) = self
            .call("answerCallbackQuery", json!({ "callback_query_id": query_id }))
            .await
        {
            tracing::debug!("answerCallbackQuery failed: {}", e);
        }
    }

    async fn delete(&self, chat_id: i64, message_id: i64) {
        if let Err(e) = self
            .call("deleteMessage", json!({ "chat_id": chat_id, "message_id": message_id }))
            .await
        {
            tracing::debug!("deleteMessage failed: {}", e);
        }
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn deliver(&self, target: &ReplyTarget, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let Some(origin) = &target.origin else {
            return self.send_new(target.chat_id, message).await;
        };

        self.answer_callback(&origin.query_id).await;

        if message.force_new {
            return self.send_new(target.chat_id, message).await;
        }

        let new_is_text = message.media.is_none();
        if origin.is_text != new_is_text {
            self.delete(target.chat_id, origin.message_id).await;
            return self.send_new(target.chat_id, message).await;
        }

        match self.edit(target.chat_id, origin, message).await {
            Ok(()) => Ok(()),
            Err(e @ (DeliveryError::NotModified | DeliveryError::Timeout)) => {
                tracing::warn!("Encountered Telegram error: {}", e);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Edit failed ({}), sending a new message instead", e);
                self.send_new(target.chat_id, message).await
            }
        }
    }

    async fn send(&self, chat_id: i64, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.send_new(chat_id, message).await
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn notify(&self, html: &str) {
        let Some(chat_id) = self.developer_chat_id else {
            tracing::debug!("No developer chat configured, dropping notification");
            return;
        };
        let message = OutboundMessage::text(html).html();
        if let Err(e) = self.send_new(chat_id, &message).await {
            tracing::error!("Could not send to the developer the message: {} ({})", html, e);
        }
    }
}

fn decorate(payload: &mut Map<String, Value>, message: &OutboundMessage) {
    if let Some(mode) = message.parse_mode {
        payload.insert("parse_mode".into(), json!(mode.as_str()));
    }
    if let Some(markup) = message.reply_markup() {
        payload.insert("reply_markup".into(), markup);
    }
}

fn transport_error(err: reqwest::Error) -> DeliveryError {
    if err.is_timeout() {
        DeliveryError::Timeout
    } else {
        DeliveryError::Transport(err.to_string())
    }
}

/// 按 description 文本归类 Bot API 错误
pub(crate) fn classify_api_error(code: i64, description: String) -> DeliveryError {
    let lower = description.to_lowercase();
    if lower.contains("message is not modified") {
        DeliveryError::NotModified
    } else if lower.contains("message to edit not found")
        || lower.contains("message to delete not found")
        || lower.contains("message can't be edited")
        || lower.contains("query is too old")
        || lower.contains("query id is invalid")
    {
        DeliveryError::StaleReference(description)
    } else if lower.contains("timed out") {
        DeliveryError::Timeout
    } else {
        DeliveryError::Api { code, description }
    }
}
