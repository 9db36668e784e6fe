//! 会话定义与构建器
//!
//! 定义是进程级静态数据：名称、选项、入口路由、每个状态的路由表、回退路由。
//! 构建时检查转移表完整性；注册标志（per_user 等）在 Dispatcher 注册时检查。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::state::{ConversationState, Next};
use crate::core::EngineError;
use crate::router::{Context, Matcher};

/// 会话跟踪与持久化选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationOptions {
    pub per_user: bool,
    pub per_chat: bool,
    pub per_message: bool,
    pub persistent: bool,
    /// 已在会话中时入口路由仍然有效（重新开始）
    pub allow_reentry: bool,
}

impl Default for ConversationOptions {
    fn default() -> Self {
        Self {
            per_user: true,
            per_chat: false,
            per_message: false,
            persistent: true,
            allow_reentry: false,
        }
    }
}

impl ConversationOptions {
    /// 状态按用户存放在单行文档中，只支持 per_user + persistent 的组合
    pub fn validate(&self, name: &str) -> Result<(), EngineError> {
        let violation = if !self.per_user {
            Some("per_user must be true")
        } else if self.per_chat {
            Some("per_chat must be false")
        } else if self.per_message {
            Some("per_message must be false")
        } else if !self.persistent {
            Some("persistent must be true")
        } else {
            None
        };
        match violation {
            Some(reason) => Err(EngineError::Configuration(format!(
                "conversation '{name}': {reason}"
            ))),
            None => Ok(()),
        }
    }
}

pub type StateHandler<S> =
    Arc<dyn Fn(&mut Context<'_>) -> anyhow::Result<Next<S>> + Send + Sync>;

pub struct Route<S> {
    pub(crate) matcher: Matcher,
    pub(crate) handler: StateHandler<S>,
}

impl<S> Clone for Route<S> {
    fn clone(&self) -> Self {
        Self {
            matcher: self.matcher.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

pub struct ConversationDefinition<S: ConversationState> {
    pub(crate) name: String,
    pub(crate) options: ConversationOptions,
    pub(crate) entry_points: Vec<Route<S>>,
    pub(crate) states: HashMap<S, Vec<Route<S>>>,
    pub(crate) fallbacks: Vec<Route<S>>,
}

impl<S: ConversationState> ConversationDefinition<S> {
    pub fn builder(name: impl Into<String>) -> ConversationBuilder<S> {
        ConversationBuilder::new(name)
    }
}

pub struct ConversationBuilder<S: ConversationState> {
    name: String,
    options: ConversationOptions,
    entry_points: Vec<Route<S>>,
    states: HashMap<S, Vec<Route<S>>>,
    fallbacks: Vec<Route<S>>,
}

impl<S: ConversationState> ConversationBuilder<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: ConversationOptions::default(),
            entry_points: Vec::new(),
            states: HashMap::new(),
            fallbacks: Vec::new(),
        }
    }

    pub fn options(mut self, options: ConversationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn allow_reentry(mut self, allow: bool) -> Self {
        self.options.allow_reentry = allow;
        self
    }

    /// 未开始时有效的路由
    pub fn entry<F>(mut self, matcher: Matcher, handler: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> anyhow::Result<Next<S>> + Send + Sync + 'static,
    {
        self.entry_points.push(Route {
            matcher,
            handler: Arc::new(handler),
        });
        self
    }

    /// 处于 `state` 时有效的路由，按声明顺序尝试
    pub fn on<F>(mut self, state: S, matcher: Matcher, handler: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> anyhow::Result<Next<S>> + Send + Sync + 'static,
    {
        self.states.entry(state).or_default().push(Route {
            matcher,
            handler: Arc::new(handler),
        });
        self
    }

    /// 任意状态（包括未开始）都有效，用于中止 / 返回
    pub fn fallback<F>(mut self, matcher: Matcher, handler: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> anyhow::Result<Next<S>> + Send + Sync + 'static,
    {
        self.fallbacks.push(Route {
            matcher,
            handler: Arc::new(handler),
        });
        self
    }

    pub fn build(self) -> Result<ConversationDefinition<S>, EngineError> {
        let name = self.name;
        let invalid = |reason: String| EngineError::Configuration(format!("conversation '{name}': {reason}"));

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid("name must be a non-empty identifier".to_string()));
        }
        if self.entry_points.is_empty() {
            return Err(invalid("at least one entry route is required".to_string()));
        }
        if self.fallbacks.is_empty() {
            return Err(invalid("at least one fallback route is required".to_string()));
        }

        let mut tokens = HashSet::new();
        for state in S::ALL {
            let token = state.token();
            if token.is_empty() || !tokens.insert(token) {
                return Err(invalid(format!("state token {token:?} is empty or duplicated")));
            }
            if self.states.get(state).map_or(true, Vec::is_empty) {
                return Err(invalid(format!("state {token} has no routes")));
            }
        }

        Ok(ConversationDefinition {
            name,
            options: self.options,
            entry_points: self.entry_points,
            states: self.states,
            fallbacks: self.fallbacks,
        })
    }
}
