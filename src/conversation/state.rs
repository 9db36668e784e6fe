//! 会话状态抽象

use std::fmt::Debug;
use std::hash::Hash;

/// 会话的枚举状态集合
///
/// token 是写入持久化文档的字符串形式，必须在同一会话内唯一且稳定。
pub trait ConversationState: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// 全部状态（构建时用于检查转移表是否完整）
    const ALL: &'static [Self];

    fn token(self) -> &'static str;

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.token() == token)
    }
}

/// 处理器返回的下一状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next<S> {
    /// 保持当前状态（未开始时仍为未开始）
    Stay,
    To(S),
    /// 结束会话：条目从文档中删除
    End,
}
