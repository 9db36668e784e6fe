//! 覆盖策略：异常结果如何改写最终的保存动作
//!
//! - UnknownEvent（reset_all）：强制写入，并把所有会话重置为未开始
//! - Faulted（wipe）：丢弃本次全部改动，擦除记录
//! - 二者同时出现时 wipe 优先

use crate::persistence::{Persistence, SaveDecision, WorkingState};

use super::EngineError;

/// 分发结果携带的覆盖标志，只在一次事件内存在，从不写入文档
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub reset_all: bool,
    pub wipe: bool,
}

impl DispatchOutcome {
    pub fn unknown() -> Self {
        Self {
            reset_all: true,
            wipe: false,
        }
    }

    pub fn faulted() -> Self {
        Self {
            reset_all: false,
            wipe: true,
        }
    }

    pub fn merge(self, other: DispatchOutcome) -> Self {
        Self {
            reset_all: self.reset_all || other.reset_all,
            wipe: self.wipe || other.wipe,
        }
    }

    pub fn is_normal(&self) -> bool {
        !self.reset_all && !self.wipe
    }

    /// 决定本次事件的唯一一次写入
    pub fn resolve(
        self,
        state: &mut WorkingState,
        persistence: &Persistence,
    ) -> Result<SaveDecision, EngineError> {
        if self.wipe {
            return Ok(SaveDecision::Wipe);
        }

        if self.reset_all {
            state.reset_conversations();
            return Ok(SaveDecision::Write(persistence.serialize(state)?));
        }

        let document = persistence.serialize(state)?;
        if state.is_unchanged(&document) {
            Ok(SaveDecision::Skip)
        } else {
            Ok(SaveDecision::Write(document))
        }
    }
}
