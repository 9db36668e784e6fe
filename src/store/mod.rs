//! 行存储适配层
//!
//! - **schema**: 表名/列名校验与参数化查询构造（BoundQuery）
//! - **executor**: 存储执行器抽象（StoreExecutor）与带重试的 SQLite 实现
//! - **adapter**: 状态文档的单次读取 / 单次写入（StateStore）
//! - **users**: 用户注册与使用计数（另一子系统，与状态文档共用一行）
//! - **context**: 显式构造、跨调用复用的连接池上下文（StoreContext）

mod adapter;
mod context;
mod executor;
mod schema;
mod users;

use thiserror::Error;

pub use adapter::{StateStore, StoredBlob};
pub use context::StoreContext;
pub use executor::{RetryPolicy, SqliteExecutor, StoreExecutor};
pub use schema::{BoundQuery, Param, TableSchema};
pub use users::UserDirectory;

/// 平台侧的用户标识（Telegram user id）
pub type UserId = u64;

/// 存储层错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Table {table} has more than 1 row for user id {user_id} ({rows} rows)")]
    Integrity {
        table: String,
        user_id: UserId,
        rows: usize,
    },

    #[error("Store unavailable after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("User id {0} does not fit the identity column")]
    IdentityOutOfRange(UserId),

    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),
}
