//! 单次事件处理主流程
//!
//! load（一次读取）→ dispatch（纯内存）→ 执行副作用 → 覆盖策略 → save（至多一次写入）

use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use super::outcome::DispatchOutcome;
use super::EngineError;
use crate::messaging::{clip_escaped, escape_html, Messenger, Notifier, OutboundMessage, MAX_MESSAGE_LENGTH};
use crate::persistence::{Persistence, SaveDecision, WorkingState};
use crate::router::{Dispatcher, Effect, Event, Update};
use crate::store::UserDirectory;

/// 单次调用的响应（Webhook / 云函数入口共用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResponse {
    pub fn ok() -> Self {
        Self {
            status_code: 200,
            body: "\"OK\"".to_string(),
        }
    }

    pub fn error() -> Self {
        Self {
            status_code: 400,
            body: "\"ERROR\"".to_string(),
        }
    }
}

pub struct Engine {
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) persistence: Persistence,
    pub(crate) directory: UserDirectory,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) apology: String,
}

impl Engine {
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    /// 处理 Webhook 请求体：非法 JSON 通知开发者并返回 400，其余返回 200
    pub async fn handle_webhook_body(&self, body: &str) -> Result<InvocationResponse, EngineError> {
        tracing::info!("Event received: {}", body);

        let update: Update = match serde_json::from_str(body) {
            Ok(update) => update,
            Err(e) => {
                let message = format!("Could not convert event {body} to an Update instance: {e}");
                tracing::error!("{}", message);
                self.notifier.notify(&escape_html(&message)).await;
                return Ok(InvocationResponse::error());
            }
        };

        self.process(&update).await?;
        Ok(InvocationResponse::ok())
    }

    /// 处理一个 Update；没有发起用户时直接跳过（不读不写存储），返回 None
    pub async fn process(&self, update: &Update) -> Result<Option<DispatchOutcome>, EngineError> {
        let Some(event) = Event::from_update(update) else {
            tracing::info!(update_id = update.update_id, "Update has no user, skipping");
            return Ok(None);
        };

        let span = tracing::info_span!("event", user_id = event.user.id, event_id = %Uuid::new_v4());
        self.process_event(update, &event)
            .instrument(span)
            .await
            .map(Some)
    }

    async fn process_event(&self, update: &Update, event: &Event) -> Result<DispatchOutcome, EngineError> {
        let user_id = event.user.id;
        let mut outcome = DispatchOutcome::default();
        let mut faults: Vec<String> = Vec::new();

        // 文档损坏 / 存储暂不可用：不分发，直接走 Faulted 擦除
        let mut state = match self.persistence.load(user_id).await {
            Ok(state) => Some(state),
            Err(e) if e.degrades_to_fault() => {
                tracing::error!("Could not load state: {}", e);
                faults.push(e.to_string());
                outcome = outcome.merge(DispatchOutcome::faulted());
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(state) = state.as_mut() {
            let report = self.dispatcher.dispatch(event, state);
            outcome = outcome.merge(report.outcome);
            faults.extend(report.faults.iter().map(ToString::to_string));

            for effect in report.effects {
                if let Err(e) = self.apply(event, effect).await {
                    tracing::error!("Effect failed: {:#}", e);
                    faults.push(format!("{e:#}"));
                    outcome = outcome.merge(DispatchOutcome::faulted());
                }
            }
        }

        if outcome.wipe {
            self.report_fault(update, state.as_ref(), &faults).await;
            self.apologize(event).await;
        } else if outcome.reset_all {
            tracing::info!("Unknown update, ending all conversations");
        }

        let decision = match state.as_mut() {
            Some(state) => outcome.resolve(state, &self.persistence)?,
            None => SaveDecision::Wipe,
        };
        self.persistence.save(user_id, decision).await?;

        Ok(outcome)
    }

    async fn apply(&self, event: &Event, effect: Effect) -> anyhow::Result<()> {
        match effect {
            Effect::Reply(message) => {
                let Some(target) = event.reply_target() else {
                    tracing::warn!("Reply requested for an update without a chat, dropping");
                    return Ok(());
                };
                self.settle(self.messenger.deliver(&target, &message).await)
            }
            Effect::Send { chat_id, message } => self.settle(self.messenger.send(chat_id, &message).await),
            Effect::RegisterUser => {
                let user = &event.user;
                self.directory
                    .register(user.id, &user.first_name, user.last_name.as_deref(), user.username.as_deref())
                    .await?;
                Ok(())
            }
            Effect::TrackUsage => {
                self.directory.increment_usage(event.user.id).await?;
                tracing::info!("Processed action: {}", event.action());
                Ok(())
            }
        }
    }

    fn settle(&self, result: Result<(), crate::messaging::DeliveryError>) -> anyhow::Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_ignorable() => {
                tracing::warn!("Encountered Telegram error: {}", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 通知开发者：事件、暂存区与错误，裁剪到单条消息上限并闭合 <pre>
    async fn report_fault(&self, update: &Update, state: Option<&WorkingState>, faults: &[String]) {
        let update_json = serde_json::to_string_pretty(update).unwrap_or_else(|_| format!("{update:?}"));
        let scratch = state
            .and_then(|s| serde_json::to_string_pretty(s.scratch()).ok())
            .unwrap_or_else(|| "{}".to_string());

        let body = format!(
            "An exception was raised while handling an update at {}:\n\n<pre>update = {}\n\nuser_data = {}\n\nerrors = {}",
            chrono::Utc::now().to_rfc3339(),
            escape_html(&update_json),
            escape_html(&scratch),
            escape_html(&faults.join("\n")),
        );
        let message = clip_escaped(&body, MAX_MESSAGE_LENGTH - "</pre>".len()) + "</pre>";
        self.notifier.notify(&message).await;
    }

    async fn apologize(&self, event: &Event) {
        let Some(target) = event.reply_target() else {
            return;
        };
        let message = OutboundMessage::text(self.apology.clone()).force_new();
        if let Err(e) = self.messenger.deliver(&target, &message).await {
            tracing::warn!("Could not deliver the apology: {}", e);
        }
    }
}
