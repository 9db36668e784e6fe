//! 事件路由
//!
//! - **update**: Telegram Update 反序列化
//! - **event**: 事件分类（命令 / 回调 / 内容）
//! - **matcher**: 可组合的匹配器
//! - **context**: 处理器上下文与副作用（Effect）
//! - **dispatcher**: 分组、首个命中、unknown 兜底、失败隔离

pub mod context;
pub mod dispatcher;
pub mod event;
pub mod matcher;
pub mod update;

pub use context::{Context, Effect};
pub use dispatcher::{DispatchReport, Dispatcher, PlainHandler, PRIMARY_GROUP};
pub use event::{Event, EventKind, IncomingMedia, IncomingMessage, UserRef};
pub use matcher::{CallbackPattern, Matcher};
pub use update::{CallbackQuery, Chat, FileRef, Message, Update, User};
