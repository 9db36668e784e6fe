//! 事件分类：命令 / 回调 / 普通内容 / 其他

use super::update::{Message, Update};
use crate::messaging::{CallbackOrigin, MediaKind, ReplyTarget};
use crate::store::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl UserRef {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMedia {
    pub kind: MediaKind,
    pub file_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub media: Option<IncomingMedia>,
    pub media_group_id: Option<String>,
}

impl IncomingMessage {
    fn from_message(message: &Message) -> Self {
        Self {
            message_id: message.message_id,
            text: message.text.clone(),
            caption: message.caption.clone(),
            media: detect_media(message),
            media_group_id: message.media_group_id.clone(),
        }
    }
}

/// 动图同时带有 document 字段，所以必须先判断 animation
fn detect_media(message: &Message) -> Option<IncomingMedia> {
    let found = if let Some(f) = &message.animation {
        Some((MediaKind::Animation, f))
    } else if let Some(f) = &message.audio {
        Some((MediaKind::Audio, f))
    } else if let Some(f) = &message.document {
        Some((MediaKind::Document, f))
    } else if let Some(f) = message.photo.first() {
        Some((MediaKind::Photo, f))
    } else if let Some(f) = &message.video {
        Some((MediaKind::Video, f))
    } else {
        message.voice.as_ref().map(|f| (MediaKind::Voice, f))
    };
    found.map(|(kind, f)| IncomingMedia {
        kind,
        file_id: f.file_id.clone(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `/name args`；name 已去掉 `@botname` 后缀并转为小写
    Command {
        name: String,
        args: String,
        message: IncomingMessage,
    },
    Callback {
        query_id: String,
        data: String,
        origin: Option<IncomingMessage>,
    },
    Content(IncomingMessage),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub update_id: i64,
    pub user: UserRef,
    pub chat_id: Option<i64>,
    pub kind: EventKind,
}

impl Event {
    /// 没有发起用户的更新（频道帖子等）返回 None，调用方应跳过存储
    pub fn from_update(update: &Update) -> Option<Self> {
        let user = update.effective_user()?;
        let user = UserRef {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        };
        let chat_id = update.effective_message().map(|m| m.chat.id);

        let kind = if let Some(query) = &update.callback_query {
            EventKind::Callback {
                query_id: query.id.clone(),
                data: query.data.clone().unwrap_or_default(),
                origin: query.message.as_ref().map(IncomingMessage::from_message),
            }
        } else if let Some(message) = update.message.as_ref().or(update.edited_message.as_ref()) {
            let incoming = IncomingMessage::from_message(message);
            match message.text.as_deref().and_then(parse_command) {
                Some((name, args)) => EventKind::Command {
                    name,
                    args,
                    message: incoming,
                },
                None => EventKind::Content(incoming),
            }
        } else {
            EventKind::Other
        };

        Some(Self {
            update_id: update.update_id,
            user,
            chat_id,
            kind,
        })
    }

    pub fn command(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Command { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn callback_data(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Callback { data, .. } => Some(data),
            _ => None,
        }
    }

    /// 用户发来的消息（命令或普通内容）
    pub fn message(&self) -> Option<&IncomingMessage> {
        match &self.kind {
            EventKind::Command { message, .. } | EventKind::Content(message) => Some(message),
            _ => None,
        }
    }

    /// 日志中记录的动作名
    pub fn action(&self) -> String {
        match &self.kind {
            EventKind::Callback { data, .. } => data.clone(),
            EventKind::Command { message, name, .. } => {
                message.text.clone().unwrap_or_else(|| format!("/{name}"))
            }
            EventKind::Content(_) => "message".to_string(),
            EventKind::Other => "other".to_string(),
        }
    }

    pub fn reply_target(&self) -> Option<ReplyTarget> {
        let chat_id = self.chat_id?;
        let origin = match &self.kind {
            EventKind::Callback {
                query_id,
                origin: Some(message),
                ..
            } => Some(CallbackOrigin {
                query_id: query_id.clone(),
                message_id: message.message_id,
                is_text: message.text.is_some(),
            }),
            _ => None,
        };
        Some(ReplyTarget { chat_id, origin })
    }
}

fn parse_command(text: &str) -> Option<(String, String)> {
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name.to_lowercase(), args.to_string()))
}
