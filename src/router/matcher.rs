//! 事件匹配器
//!
//! 纯数据描述，可组合（and / or / not），在注册时构造，分发时只读。

use regex::Regex;

use super::event::{Event, EventKind};
use crate::core::EngineError;
use crate::messaging::MediaKind;

#[derive(Debug, Clone)]
pub enum CallbackPattern {
    Exact(String),
    Prefix(String),
    Regex(Regex),
}

impl CallbackPattern {
    fn matches(&self, data: &str) -> bool {
        match self {
            CallbackPattern::Exact(s) => data == s,
            CallbackPattern::Prefix(p) => data.starts_with(p.as_str()),
            CallbackPattern::Regex(re) => re.is_match(data),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Matcher {
    /// 任意事件
    Any,
    Command(String),
    Callback(CallbackPattern),
    /// 非命令的文本消息
    Text,
    /// 带指定类型媒体的消息；列表为空表示任意媒体
    Media(Vec<MediaKind>),
    /// 说明文字恰好等于其中之一
    Caption(Vec<String>),
    /// 属于相册（media group）的消息
    MediaGroup,
    All(Vec<Matcher>),
    AnyOf(Vec<Matcher>),
    Not(Box<Matcher>),
}

impl Matcher {
    pub fn command(name: &str) -> Self {
        Matcher::Command(name.to_lowercase())
    }

    pub fn callback(data: impl Into<String>) -> Self {
        Matcher::Callback(CallbackPattern::Exact(data.into()))
    }

    pub fn callback_prefix(prefix: impl Into<String>) -> Self {
        Matcher::Callback(CallbackPattern::Prefix(prefix.into()))
    }

    pub fn callback_regex(pattern: &str) -> Result<Self, EngineError> {
        let re = Regex::new(pattern)
            .map_err(|e| EngineError::Configuration(format!("invalid callback pattern {pattern:?}: {e}")))?;
        Ok(Matcher::Callback(CallbackPattern::Regex(re)))
    }

    pub fn any_media() -> Self {
        Matcher::Media(Vec::new())
    }

    pub fn and(self, other: Matcher) -> Self {
        match self {
            Matcher::All(mut items) => {
                items.push(other);
                Matcher::All(items)
            }
            m => Matcher::All(vec![m, other]),
        }
    }

    pub fn or(self, other: Matcher) -> Self {
        match self {
            Matcher::AnyOf(mut items) => {
                items.push(other);
                Matcher::AnyOf(items)
            }
            m => Matcher::AnyOf(vec![m, other]),
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Command(name) => event.command() == Some(name.as_str()),
            Matcher::Callback(pattern) => event.callback_data().is_some_and(|d| pattern.matches(d)),
            Matcher::Text => matches!(&event.kind, EventKind::Content(m) if m.text.is_some()),
            Matcher::Media(kinds) => match &event.kind {
                EventKind::Content(m) => m
                    .media
                    .as_ref()
                    .is_some_and(|media| kinds.is_empty() || kinds.contains(&media.kind)),
                _ => false,
            },
            Matcher::Caption(words) => match &event.kind {
                EventKind::Content(m) => m
                    .caption
                    .as_deref()
                    .is_some_and(|c| words.iter().any(|w| w == c)),
                _ => false,
            },
            Matcher::MediaGroup => event.message().is_some_and(|m| m.media_group_id.is_some()),
            Matcher::All(items) => items.iter().all(|m| m.matches(event)),
            Matcher::AnyOf(items) => items.iter().any(|m| m.matches(event)),
            Matcher::Not(inner) => !inner.matches(event),
        }
    }
}

impl std::ops::Not for Matcher {
    type Output = Matcher;

    fn not(self) -> Matcher {
        Matcher::Not(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::update::Update;

    fn event(raw: &str) -> Event {
        let update: Update = serde_json::from_str(raw).unwrap();
        Event::from_update(&update).unwrap()
    }

    fn text(t: &str) -> Event {
        event(&format!(
            r#"{{"update_id":1,"message":{{"message_id":1,"from":{{"id":1,"first_name":"A"}},"chat":{{"id":1}},"text":{}}}}}"#,
            serde_json::to_string(t).unwrap()
        ))
    }

    fn callback(data: &str) -> Event {
        event(&format!(
            r#"{{"update_id":1,"callback_query":{{"id":"q","from":{{"id":1,"first_name":"A"}},"data":"{data}"}}}}"#
        ))
    }

    #[test]
    fn test_command_and_text_are_disjoint() {
        assert!(Matcher::command("Start").matches(&text("/start")));
        assert!(!Matcher::Text.matches(&text("/start")));
        assert!(Matcher::Text.matches(&text("hello")));
        assert!(!Matcher::command("start").matches(&text("start")));
    }

    #[test]
    fn test_callback_patterns() {
        assert!(Matcher::callback("POST_CHANNEL_STOP").matches(&callback("POST_CHANNEL_STOP")));
        assert!(!Matcher::callback("POST_CHANNEL").matches(&callback("POST_CHANNEL_STOP")));
        assert!(Matcher::callback_prefix("PRINCIPLES_PAGE").matches(&callback("PRINCIPLES_PAGE#3")));

        let either = Matcher::callback_regex("^POST_CHANNEL_PUBLIC$|^POST_CHANNEL_PRIVATE$").unwrap();
        assert!(either.matches(&callback("POST_CHANNEL_PRIVATE")));
        assert!(!either.matches(&callback("POST_CHANNEL_PRIVATE_X")));
        assert!(Matcher::callback_regex("(").is_err());
    }

    #[test]
    fn test_combinators() {
        let album_photo = event(
            r#"{"update_id":1,"message":{"message_id":1,"from":{"id":1,"first_name":"A"},"chat":{"id":1},
                "photo":[{"file_id":"p"}],"media_group_id":"g1","caption":"симсалабим"}}"#,
        );
        let content = Matcher::Text.or(Matcher::any_media()).and(!Matcher::MediaGroup);
        assert!(!content.matches(&album_photo));
        assert!(content.matches(&text("hi")));

        let magic = Matcher::Caption(vec!["симсалабим".to_string()]).and(Matcher::Media(vec![MediaKind::Photo]));
        assert!(magic.matches(&album_photo));
        assert!(Matcher::Any.matches(&callback("x")));
    }
}
