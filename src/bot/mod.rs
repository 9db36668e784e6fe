//! 演示机器人
//!
//! 把通用命令、两个会话、unknown 兜底与使用统计注册到 Dispatcher 上，
//! 用于端到端驱动引擎。

pub mod menu;
pub mod post_channel;
pub mod principles;

use std::sync::Arc;

use anyhow::Context as _;

use crate::config::{AppConfig, BotSection};
use crate::core::{Engine, EngineBuilder, EngineError};
use crate::messaging::{MediaKind, TelegramClient};
use crate::router::{Dispatcher, Matcher, PRIMARY_GROUP};
use crate::store::StoreContext;

/// 内联按钮的回调数据
pub mod callbacks {
    pub const POST_CHANNEL_START: &str = "POST_CHANNEL_START";
    pub const POST_CHANNEL_PUBLIC: &str = "POST_CHANNEL_PUBLIC";
    pub const POST_CHANNEL_PRIVATE: &str = "POST_CHANNEL_PRIVATE";
    pub const POST_CHANNEL_CONFIRM_SENDING: &str = "POST_CHANNEL_CONFIRM_SENDING";
    pub const POST_CHANNEL_STOP: &str = "POST_CHANNEL_STOP";
    pub const PRINCIPLES_START: &str = "PRINCIPLES_START";
    pub const PRINCIPLES_PAGE: &str = "PRINCIPLES_PAGE";
    pub const PRINCIPLES_STOP: &str = "PRINCIPLES_STOP";
    pub const SOS_START: &str = "SOS_START";
    pub const SOS_STOP: &str = "SOS_STOP";
}

/// 使用统计所在分组
pub const USAGE_GROUP: i32 = 1;

pub fn build_dispatcher(bot: &BotSection) -> Result<Dispatcher, EngineError> {
    let bot = Arc::new(bot.clone());
    let mut dispatcher = Dispatcher::new();

    let start_bot = Arc::clone(&bot);
    let help_bot = Arc::clone(&bot);
    dispatcher
        .add_handler(PRIMARY_GROUP, "start", Matcher::command("start"), move |ctx| {
            menu::on_start(ctx, &start_bot)
        })
        .add_handler(PRIMARY_GROUP, "help", Matcher::command("help"), move |ctx| {
            menu::on_help(ctx, &help_bot)
        });

    dispatcher.add_conversation(PRIMARY_GROUP, post_channel::conversation(Arc::clone(&bot))?)?;
    dispatcher.add_conversation(PRIMARY_GROUP, principles::conversation()?)?;

    let magic_media = Matcher::Caption(vec!["симсалабим".to_string()])
        .and(Matcher::Media(vec![
            MediaKind::Animation,
            MediaKind::Audio,
            MediaKind::Document,
            MediaKind::Photo,
            MediaKind::Video,
        ]))
        .and(!Matcher::MediaGroup);

    dispatcher
        .add_handler(PRIMARY_GROUP, "sos", Matcher::command("sos"), menu::sos_start)
        .add_handler(PRIMARY_GROUP, "sos", Matcher::callback(callbacks::SOS_START), menu::sos_start)
        .add_handler(PRIMARY_GROUP, "sos_stop", Matcher::callback(callbacks::SOS_STOP), menu::on_top)
        .add_handler(PRIMARY_GROUP, "media", magic_media, menu::on_media)
        .set_unknown_handler(&post_channel::TRANSIENT_KEYS, menu::on_unknown)
        .add_handler(USAGE_GROUP, "usage", Matcher::Any, menu::on_every);

    Ok(dispatcher)
}

/// 按配置组装：存储上下文（进程内复用）+ Bot API 客户端 + 演示机器人
pub async fn engine_from_config(config: &AppConfig) -> anyhow::Result<(Engine, StoreContext)> {
    let store = StoreContext::connect(&config.store)
        .await
        .context("Failed to open the state store")?;
    let telegram = Arc::new(TelegramClient::new(&config.telegram).context("Failed to configure Telegram")?);
    let dispatcher = build_dispatcher(&config.bot).context("Failed to register handlers")?;

    let engine = EngineBuilder::new()
        .with_dispatcher(dispatcher)
        .with_store_context(&store)
        .with_telegram(telegram)
        .with_apology(menu::APOLOGY_TEXT)
        .build()?;
    Ok((engine, store))
}
