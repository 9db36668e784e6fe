//! 单次事件内的可变工作状态
//!
//! 暂存区（任意 JSON 值）+ 各会话当前状态；会话条目缺失即表示“未开始”。

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::document::StateDocument;

#[derive(Debug, Clone, Default)]
pub struct WorkingState {
    scratch: Map<String, Value>,
    conversations: BTreeMap<String, String>,
    /// 加载时文档的规范化文本；记录不存在或为 NULL 时为 None
    snapshot: Option<String>,
}

impl WorkingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_document(document: StateDocument, snapshot: Option<String>) -> Self {
        Self {
            scratch: document.scratch,
            conversations: document.conversations,
            snapshot,
        }
    }

    pub fn scratch(&self) -> &Map<String, Value> {
        &self.scratch
    }

    pub fn scratch_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.scratch
    }

    /// 取出并反序列化暂存值；缺失或类型不符都返回 None
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.scratch
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.scratch.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.scratch.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.scratch.remove(key)
    }

    pub fn remove_keys<'k>(&mut self, keys: impl IntoIterator<Item = &'k str>) {
        for key in keys {
            self.scratch.remove(key);
        }
    }

    pub fn conversation(&self, name: &str) -> Option<&str> {
        self.conversations.get(name).map(String::as_str)
    }

    pub fn conversations(&self) -> &BTreeMap<String, String> {
        &self.conversations
    }

    pub fn set_conversation(&mut self, name: &str, token: &str) {
        self.conversations.insert(name.to_string(), token.to_string());
    }

    /// 会话回到未开始：删除条目而不是保存终止标记
    pub fn end_conversation(&mut self, name: &str) -> Option<String> {
        self.conversations.remove(name)
    }

    pub fn reset_conversations(&mut self) {
        self.conversations.clear();
    }

    pub fn to_document(&self) -> StateDocument {
        StateDocument {
            scratch: self.scratch.clone(),
            conversations: self.conversations.clone(),
        }
    }

    pub fn snapshot(&self) -> Option<&str> {
        self.snapshot.as_deref()
    }

    /// 与加载时相比是否未变化（记录缺失 / NULL 等同于空文档）
    pub fn is_unchanged(&self, document: &str) -> bool {
        self.snapshot.as_deref().unwrap_or("{}") == document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_accessors() {
        let mut state = WorkingState::new();
        state.set("post_channel_message", "hello");
        state.set("page", 3);

        assert_eq!(state.get_str("post_channel_message"), Some("hello"));
        assert_eq!(state.get::<u32>("page"), Some(3));
        assert_eq!(state.get::<u32>("post_channel_message"), None);

        state.remove_keys(["post_channel_message", "missing"]);
        assert!(state.get_str("post_channel_message").is_none());
        assert_eq!(state.scratch().len(), 1);
    }

    #[test]
    fn test_end_conversation_removes_entry() {
        let mut state = WorkingState::new();
        state.set_conversation("meetings_conv", "MEETINGS_GET_NAME");
        state.set_conversation("principles_conv", "PRINCIPLES_CHOOSE_ACTION");
        assert_eq!(state.conversation("meetings_conv"), Some("MEETINGS_GET_NAME"));

        state.end_conversation("meetings_conv");
        assert_eq!(state.conversation("meetings_conv"), None);
        assert_eq!(state.conversations().len(), 1);

        state.reset_conversations();
        assert!(state.conversations().is_empty());
    }

    #[test]
    fn test_fresh_state_equals_empty_document() {
        let state = WorkingState::new();
        assert!(state.is_unchanged("{}"));
        assert!(!state.is_unchanged(r#"{"scratch":{"a":1}}"#));
    }
}
