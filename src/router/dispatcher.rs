//! 事件分发器
//!
//! 处理器按分组注册，分组按编号升序依次运行；组内按声明顺序尝试，第一个命中的执行。
//! 主分组（0）无任何命中时运行兜底的 unknown 处理器并标记 UnknownEvent。
//! 处理器返回错误或 panic 都记为 HandlerFault（标记 Faulted），不影响后续分组。

use std::collections::{BTreeMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::context::{Context, Effect};
use super::event::Event;
use super::matcher::Matcher;
use crate::conversation::Conversation;
use crate::core::{DispatchOutcome, EngineError, HandlerFault};
use crate::persistence::WorkingState;

/// 业务处理器所在的主分组
pub const PRIMARY_GROUP: i32 = 0;

pub type PlainHandler = Arc<dyn Fn(&mut Context<'_>) -> anyhow::Result<()> + Send + Sync>;

enum Entry {
    Plain {
        name: String,
        matcher: Matcher,
        handler: PlainHandler,
    },
    Conversation(Box<dyn Conversation>),
}

impl Entry {
    fn name(&self) -> &str {
        match self {
            Entry::Plain { name, .. } => name,
            Entry::Conversation(conv) => conv.name(),
        }
    }

    /// 未命中返回 None
    fn run(&self, ctx: &mut Context<'_>) -> Option<anyhow::Result<()>> {
        match self {
            Entry::Plain { matcher, handler, .. } => {
                if matcher.matches(ctx.event()) {
                    Some(handler(ctx))
                } else {
                    None
                }
            }
            Entry::Conversation(conv) => conv.handle(ctx),
        }
    }
}

struct UnknownHandler {
    transient_keys: Vec<String>,
    handler: PlainHandler,
}

/// 一次分发的结果：待执行的副作用 + 覆盖标志 + 处理器失败
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcome: DispatchOutcome,
    pub effects: Vec<Effect>,
    pub faults: Vec<HandlerFault>,
}

pub struct Dispatcher {
    groups: BTreeMap<i32, Vec<Entry>>,
    conversation_names: HashSet<String>,
    unknown: Option<UnknownHandler>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(PRIMARY_GROUP, Vec::new());
        Self {
            groups,
            conversation_names: HashSet::new(),
            unknown: None,
        }
    }

    pub fn add_handler<F>(&mut self, group: i32, name: &str, matcher: Matcher, handler: F) -> &mut Self
    where
        F: Fn(&mut Context<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.groups.entry(group).or_default().push(Entry::Plain {
            name: name.to_string(),
            matcher,
            handler: Arc::new(handler),
        });
        self
    }

    /// 注册会话；标志不符合要求或名称重复时返回 Configuration 错误
    pub fn add_conversation<C>(&mut self, group: i32, conversation: C) -> Result<&mut Self, EngineError>
    where
        C: Conversation + 'static,
    {
        let name = conversation.name().to_string();
        conversation.options().validate(&name)?;
        if !self.conversation_names.insert(name.clone()) {
            return Err(EngineError::Configuration(format!(
                "conversation '{name}' is registered twice"
            )));
        }
        self.groups
            .entry(group)
            .or_default()
            .push(Entry::Conversation(Box::new(conversation)));
        tracing::debug!("Registered conversation {} in group {}", name, group);
        Ok(self)
    }

    /// 主分组无命中时运行；`transient_keys` 为进行中的多步输入在暂存区里的键，一并清除
    pub fn set_unknown_handler<F>(&mut self, transient_keys: &[&str], handler: F) -> &mut Self
    where
        F: Fn(&mut Context<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.unknown = Some(UnknownHandler {
            transient_keys: transient_keys.iter().map(|k| k.to_string()).collect(),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn conversation_names(&self) -> impl Iterator<Item = &str> {
        self.conversation_names.iter().map(String::as_str)
    }

    /// 分发单个事件；只改动工作状态并收集副作用，不做 I/O
    pub fn dispatch(&self, event: &Event, state: &mut WorkingState) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (&group, entries) in &self.groups {
            let mut matched = false;
            let mut stop = false;

            for entry in entries {
                let mut ctx = Context::new(event, state);
                let Some(result) = guarded(entry.name(), || entry.run(&mut ctx)) else {
                    continue;
                };
                matched = true;
                let (effects, stop_requested) = ctx.into_parts();
                absorb(&mut report, entry.name(), result, effects);
                stop = stop_requested;
                break;
            }

            if group == PRIMARY_GROUP && !matched {
                report.outcome = report.outcome.merge(DispatchOutcome::unknown());
                stop = self.run_unknown(event, state, &mut report);
            }

            if stop {
                tracing::debug!("Propagation stopped after group {}", group);
                break;
            }
        }

        report
    }

    fn run_unknown(&self, event: &Event, state: &mut WorkingState, report: &mut DispatchReport) -> bool {
        let Some(unknown) = &self.unknown else {
            tracing::debug!("No handler matched and no unknown handler is set");
            return false;
        };
        state.remove_keys(unknown.transient_keys.iter().map(String::as_str));

        let mut ctx = Context::new(event, state);
        let result = guarded("unknown", || Some((unknown.handler)(&mut ctx)));
        let (effects, stop) = ctx.into_parts();
        if let Some(result) = result {
            absorb(report, "unknown", result, effects);
        }
        stop
    }
}

/// 把 panic 转成普通错误
fn guarded<F>(name: &str, f: F) -> Option<anyhow::Result<()>>
where
    F: FnOnce() -> Option<anyhow::Result<()>>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("Handler {} panicked: {}", name, message);
            Some(Err(anyhow::anyhow!("panicked: {message}")))
        }
    }
}

/// 成功则收下副作用；失败则丢弃该处理器的副作用并记录 Faulted
fn absorb(report: &mut DispatchReport, name: &str, result: anyhow::Result<()>, effects: Vec<Effect>) {
    match result {
        Ok(()) => report.effects.extend(effects),
        Err(e) => {
            tracing::error!("Exception while handling an update in {}: {:#}", name, e);
            report.faults.push(HandlerFault::new(name, format!("{e:#}")));
            report.outcome = report.outcome.merge(DispatchOutcome::faulted());
        }
    }
}
