//! 会话状态机的执行
//!
//! 对单个事件：解析当前状态 → 选出有效路由 → 执行第一个命中的处理器 → 记录下一状态。

use super::definition::{ConversationDefinition, ConversationOptions, Route};
use super::state::{ConversationState, Next};
use crate::persistence::WorkingState;
use crate::router::{Context, Event};

/// 对 Dispatcher 暴露的对象安全接口
pub trait Conversation: Send + Sync {
    fn name(&self) -> &str;

    fn options(&self) -> ConversationOptions;

    /// 没有路由命中时返回 None；命中时返回处理器结果（成功时下一状态已写入工作状态）
    fn handle(&self, ctx: &mut Context<'_>) -> Option<anyhow::Result<()>>;
}

impl<S: ConversationState> ConversationDefinition<S> {
    /// 当前状态；条目缺失或 token 无法识别都视为未开始
    pub fn current_state(&self, state: &WorkingState) -> Option<S> {
        let token = state.conversation(&self.name)?;
        let resolved = S::from_token(token);
        if resolved.is_none() {
            tracing::warn!(
                "Conversation {} has unknown stored state {:?}, treating as not started",
                self.name,
                token
            );
        }
        resolved
    }

    fn select(&self, current: Option<S>, event: &Event) -> Option<&Route<S>> {
        let entry: &[Route<S>] = if current.is_none() || self.options.allow_reentry {
            &self.entry_points
        } else {
            &[]
        };
        let state_routes: &[Route<S>] = current
            .and_then(|s| self.states.get(&s))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        entry
            .iter()
            .chain(state_routes)
            .chain(&self.fallbacks)
            .find(|route| route.matcher.matches(event))
    }
}

impl<S: ConversationState> Conversation for ConversationDefinition<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> ConversationOptions {
        self.options
    }

    fn handle(&self, ctx: &mut Context<'_>) -> Option<anyhow::Result<()>> {
        let current = self.current_state(ctx.state());
        let route = self.select(current, ctx.event())?;

        let next = match (route.handler)(ctx) {
            Ok(next) => next,
            Err(e) => return Some(Err(e)),
        };

        match next {
            Next::Stay => {}
            Next::To(state) => ctx.state_mut().set_conversation(&self.name, state.token()),
            Next::End => {
                ctx.state_mut().end_conversation(&self.name);
            }
        }
        tracing::debug!(conversation = %self.name, from = ?current, to = ?next, "Conversation transition");
        Some(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationBuilder;
    use crate::messaging::OutboundMessage;
    use crate::router::{Matcher, Update};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Step {
        Ask,
        Confirm,
    }

    impl ConversationState for Step {
        const ALL: &'static [Self] = &[Step::Ask, Step::Confirm];

        fn token(self) -> &'static str {
            match self {
                Step::Ask => "ASK",
                Step::Confirm => "CONFIRM",
            }
        }
    }

    fn survey(allow_reentry: bool) -> ConversationDefinition<Step> {
        ConversationBuilder::new("survey_conv")
            .allow_reentry(allow_reentry)
            .entry(Matcher::command("go"), |ctx| {
                ctx.reply(OutboundMessage::text("question?"));
                Ok(Next::To(Step::Ask))
            })
            .on(Step::Ask, Matcher::Text, |ctx| {
                let answer = ctx.event().message().and_then(|m| m.text.clone()).unwrap_or_default();
                ctx.state_mut().set("answer", answer);
                Ok(Next::To(Step::Confirm))
            })
            .on(Step::Confirm, Matcher::callback("YES"), |_| Ok(Next::End))
            .on(Step::Confirm, Matcher::callback("BROKEN"), |_| Err(anyhow::anyhow!("boom")))
            .fallback(Matcher::callback("STOP"), |ctx| {
                ctx.reply(OutboundMessage::text("menu"));
                Ok(Next::End)
            })
            .build()
            .unwrap()
    }

    fn text(t: &str) -> Event {
        let raw = serde_json::json!({
            "update_id": 1,
            "message": {"message_id": 1, "from": {"id": 5, "first_name": "A"}, "chat": {"id": 5}, "text": t}
        });
        let update: Update = serde_json::from_value(raw).unwrap();
        Event::from_update(&update).unwrap()
    }

    fn callback(data: &str) -> Event {
        let raw = serde_json::json!({
            "update_id": 1,
            "callback_query": {"id": "q", "from": {"id": 5, "first_name": "A"}, "data": data}
        });
        let update: Update = serde_json::from_value(raw).unwrap();
        Event::from_update(&update).unwrap()
    }

    fn run(conv: &dyn Conversation, event: &Event, state: &mut WorkingState) -> Option<anyhow::Result<()>> {
        let mut ctx = Context::new(event, state);
        conv.handle(&mut ctx)
    }

    #[test]
    fn test_walks_through_states_and_ends() {
        let conv = survey(false);
        let mut state = WorkingState::new();

        assert!(run(&conv, &text("hello"), &mut state).is_none());

        run(&conv, &text("/go"), &mut state).unwrap().unwrap();
        assert_eq!(state.conversation("survey_conv"), Some("ASK"));

        run(&conv, &text("forty two"), &mut state).unwrap().unwrap();
        assert_eq!(state.conversation("survey_conv"), Some("CONFIRM"));
        assert_eq!(state.get_str("answer"), Some("forty two"));

        run(&conv, &callback("YES"), &mut state).unwrap().unwrap();
        assert_eq!(state.conversation("survey_conv"), None);
    }

    #[test]
    fn test_entry_ignored_mid_conversation_without_reentry() {
        let conv = survey(false);
        let mut state = WorkingState::new();
        state.set_conversation("survey_conv", "CONFIRM");
        assert!(run(&conv, &text("/go"), &mut state).is_none());

        let conv = survey(true);
        run(&conv, &text("/go"), &mut state).unwrap().unwrap();
        assert_eq!(state.conversation("survey_conv"), Some("ASK"));
    }

    #[test]
    fn test_fallback_valid_from_any_state() {
        let conv = survey(false);
        let mut state = WorkingState::new();
        run(&conv, &callback("STOP"), &mut state).unwrap().unwrap();
        assert_eq!(state.conversation("survey_conv"), None);

        state.set_conversation("survey_conv", "ASK");
        let event = callback("STOP");
        let mut ctx = Context::new(&event, &mut state);
        conv.handle(&mut ctx).unwrap().unwrap();
        assert_eq!(ctx.effects().len(), 1);
        drop(ctx);
        assert!(state.conversations().is_empty());
    }

    #[test]
    fn test_unknown_token_treated_as_not_started() {
        let conv = survey(false);
        let mut state = WorkingState::new();
        state.set_conversation("survey_conv", "REMOVED_STATE");
        run(&conv, &text("/go"), &mut state).unwrap().unwrap();
        assert_eq!(state.conversation("survey_conv"), Some("ASK"));
    }

    #[test]
    fn test_handler_error_keeps_state() {
        let conv = survey(false);
        let mut state = WorkingState::new();
        state.set_conversation("survey_conv", "CONFIRM");
        let result = run(&conv, &callback("BROKEN"), &mut state).unwrap();
        assert!(result.is_err());
        assert_eq!(state.conversation("survey_conv"), Some("CONFIRM"));
    }
}
