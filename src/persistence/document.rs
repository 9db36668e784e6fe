//! 持久化文档格式
//!
//! `{"conversations": {"<name>": "<state>"}, "scratch": {...}}`，两段为空时整段省略；
//! 不含用户 id，也不含任何覆盖标志。键按字典序输出，同一状态总是得到同一份文本。

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    /// 字段按键名字典序声明：serde 按声明顺序输出
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub conversations: BTreeMap<String, String>,

    /// 旧版文档使用 `user_data` 作为该段的键名
    #[serde(
        default,
        alias = "user_data",
        deserialize_with = "null_as_default",
        skip_serializing_if = "Map::is_empty"
    )]
    pub scratch: Map<String, Value>,
}

impl StateDocument {
    /// 解析存储的文本；顶层必须是 JSON 对象，未知键忽略
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        if !value.is_object() {
            return Err(serde_json::Error::custom(
                "state document must be a JSON object",
            ));
        }
        serde_json::from_value(value)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_empty(&self) -> bool {
        self.scratch.is_empty() && self.conversations.is_empty()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
