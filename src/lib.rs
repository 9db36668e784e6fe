//! Kholodok - Telegram 机器人会话分发与持久化引擎
//!
//! 每个事件由一次独立调用处理：加载用户的状态文档 → 分发到处理器与会话状态机 →
//! 按覆盖策略写回。调用之间只共享显式构造的存储上下文。
//!
//! 模块划分：
//! - **bot**: 演示机器人（菜单、投稿会话、原则会话、unknown 兜底、使用统计）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **conversation**: 会话状态机（状态枚举、定义构建、路由选择与转移）
//! - **core**: 错误分类、覆盖策略、引擎主流程与构建器
//! - **messaging**: 出站消息与 Telegram Bot API 客户端
//! - **observability**: 日志初始化
//! - **persistence**: 工作状态、文档格式与持久化门面
//! - **router**: Update 解析、事件分类、匹配器与分发器
//! - **store**: 参数化查询、带重试的执行器与状态列读写

pub mod bot;
pub mod config;
pub mod conversation;
pub mod core;
pub mod messaging;
pub mod observability;
pub mod persistence;
pub mod router;
pub mod store;

pub use crate::core::{DispatchOutcome, Engine, EngineBuilder, EngineError, InvocationResponse};
