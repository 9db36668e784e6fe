//! 持久化层
//!
//! 每个事件开始时从状态存储加载一份 [`WorkingState`]，结束时按 [`SaveDecision`] 写回。

pub mod document;
pub mod facade;
pub mod working;

pub use document::StateDocument;
pub use facade::{Persistence, SaveDecision};
pub use working::WorkingState;
