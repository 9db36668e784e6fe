//! 处理器上下文
//!
//! 处理器是同步函数：读事件、改工作状态、登记出站效果；不做任何 I/O。

use super::event::{Event, UserRef};
use crate::messaging::OutboundMessage;
use crate::persistence::WorkingState;

/// 分发结束后由 Engine 执行的副作用
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// 回复当前事件（回调事件时可能编辑原消息）
    Reply(OutboundMessage),
    /// 发送到指定 chat
    Send { chat_id: i64, message: OutboundMessage },
    /// 登记 / 刷新用户资料（用户目录子系统）
    RegisterUser,
    /// 使用次数 +1（用户目录子系统）
    TrackUsage,
}

pub struct Context<'a> {
    event: &'a Event,
    state: &'a mut WorkingState,
    effects: Vec<Effect>,
    stop: bool,
}

impl<'a> Context<'a> {
    pub fn new(event: &'a Event, state: &'a mut WorkingState) -> Self {
        Self {
            event,
            state,
            effects: Vec::new(),
            stop: false,
        }
    }

    pub fn event(&self) -> &'a Event {
        self.event
    }

    pub fn user(&self) -> &'a UserRef {
        &self.event.user
    }

    pub fn state(&self) -> &WorkingState {
        self.state
    }

    pub fn state_mut(&mut self) -> &mut WorkingState {
        self.state
    }

    pub fn reply(&mut self, message: OutboundMessage) {
        self.effects.push(Effect::Reply(message));
    }

    pub fn send_to(&mut self, chat_id: i64, message: OutboundMessage) {
        self.effects.push(Effect::Send { chat_id, message });
    }

    pub fn register_user(&mut self) {
        self.effects.push(Effect::RegisterUser);
    }

    pub fn track_usage(&mut self) {
        self.effects.push(Effect::TrackUsage);
    }

    /// 后续分组不再处理该事件
    pub fn stop_propagation(&mut self) {
        self.stop = true;
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub(crate) fn into_parts(self) -> (Vec<Effect>, bool) {
        (self.effects, self.stop)
    }
}
