//! 核心编排层：错误分类、覆盖策略、引擎主流程与构建器

pub mod builder;
pub mod engine;
pub mod error;
pub mod outcome;

pub use builder::EngineBuilder;
pub use engine::{Engine, InvocationResponse};
pub use error::{EngineError, HandlerFault};
pub use outcome::DispatchOutcome;
