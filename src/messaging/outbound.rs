//! 出站消息描述
//!
//! 处理器只构造 [`OutboundMessage`]，真正的投递由 Engine 在分发结束后通过 Messenger 完成。

use serde::{Deserialize, Serialize};

/// Telegram 单条文本消息上限
pub const MAX_MESSAGE_LENGTH: usize = 4096;
/// Telegram 媒体说明文字上限
pub const MAX_CAPTION_LENGTH: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaKind {
    Animation,
    Audio,
    Document,
    Photo,
    Video,
    Voice,
}

impl MediaKind {
    /// 对应的 Bot API 发送方法与文件字段
    pub fn send_method(self) -> (&'static str, &'static str) {
        match self {
            MediaKind::Animation => ("sendAnimation", "animation"),
            MediaKind::Audio => ("sendAudio", "audio"),
            MediaKind::Document => ("sendDocument", "document"),
            MediaKind::Photo => ("sendPhoto", "photo"),
            MediaKind::Video => ("sendVideo", "video"),
            MediaKind::Voice => ("sendVoice", "voice"),
        }
    }

    /// editMessageMedia 中 InputMedia 的 type 字段
    pub fn input_media_type(self) -> &'static str {
        self.send_method().1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Html,
}

impl ParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseMode::Html => "HTML",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub callback_data: String,
}

impl Button {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: data.into(),
        }
    }
}

/// 以 file_id 引用的已上传媒体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMedia {
    pub kind: MediaKind,
    pub file_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundMessage {
    /// 文本消息正文；带媒体时作为说明文字
    pub text: String,
    pub media: Option<OutboundMedia>,
    pub keyboard: Vec<Vec<Button>>,
    pub parse_mode: Option<ParseMode>,
    pub disable_preview: bool,
    /// 回调事件中也发送新消息而不是编辑原消息
    pub force_new: bool,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn media(kind: MediaKind, file_id: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            text: caption.into(),
            media: Some(OutboundMedia {
                kind,
                file_id: file_id.into(),
            }),
            ..Self::default()
        }
    }

    pub fn html(mut self) -> Self {
        self.parse_mode = Some(ParseMode::Html);
        self
    }

    pub fn keyboard(mut self, rows: Vec<Vec<Button>>) -> Self {
        self.keyboard = rows;
        self
    }

    pub fn no_preview(mut self) -> Self {
        self.disable_preview = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// 按消息类型裁剪到平台上限（按 UTF-16 码元计）
    pub fn clipped_text(&self) -> String {
        let limit = if self.media.is_some() {
            MAX_CAPTION_LENGTH
        } else {
            MAX_MESSAGE_LENGTH
        };
        clip(&self.text, limit)
    }

    /// Bot API 的 inline_keyboard 结构；无按钮时为 None
    pub fn reply_markup(&self) -> Option<serde_json::Value> {
        if self.keyboard.is_empty() {
            return None;
        }
        let rows: Vec<Vec<serde_json::Value>> = self
            .keyboard
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| serde_json::json!({ "text": b.text, "callback_data": b.callback_data }))
                    .collect()
            })
            .collect();
        Some(serde_json::json!({ "inline_keyboard": rows }))
    }
}

/// 回复目标：会话所在 chat，以及（回调事件时）被点击按钮所在的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub chat_id: i64,
    pub origin: Option<CallbackOrigin>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOrigin {
    pub query_id: String,
    pub message_id: i64,
    /// 原消息是文本消息（否则为媒体消息）
    pub is_text: bool,
}

/// Bot API 的长度限制按 UTF-16 码元计算
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// 截断到至多 `limit` 个 UTF-16 码元，不拆开字符
pub fn clip(text: &str, limit: usize) -> String {
    let mut units = 0;
    for (i, c) in text.char_indices() {
        units += c.len_utf16();
        if units > limit {
            return text[..i].to_string();
        }
    }
    text.to_string()
}

/// 截断已转义的 HTML 文本；切点落在实体内部时退到 `&` 之前
pub fn clip_escaped(text: &str, limit: usize) -> String {
    let mut clipped = clip(text, limit);
    if let Some(amp) = clipped.rfind('&') {
        if !clipped[amp..].contains(';') {
            clipped.truncate(amp);
        }
    }
    clipped
}

/// 转义 HTML 解析模式下的特殊字符
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
