//! 会话状态机
//!
//! - **state**: 状态枚举抽象（ConversationState）与 Next
//! - **definition**: 静态定义、选项与构建期校验
//! - **machine**: 单个事件上的路由选择与状态转移（Conversation trait）

pub mod definition;
pub mod machine;
pub mod state;

pub use definition::{ConversationBuilder, ConversationDefinition, ConversationOptions, StateHandler};
pub use machine::Conversation;
pub use state::{ConversationState, Next};
