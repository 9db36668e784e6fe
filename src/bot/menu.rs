//! 顶层菜单与通用命令（/start、/help、/sos）

use super::callbacks;
use crate::config::BotSection;
use crate::messaging::{escape_html, Button, OutboundMessage};
use crate::router::{Context, UserRef};

pub const TOP_TEXT: &str = "Что хочешь сделать?";

pub const UNKNOWN_TEXT: &str =
    "Сорри, не понял тебя ¯\\_(ツ)_/¯\n\nДавай попробуем еще раз. Что хочешь сделать?";

pub const APOLOGY_TEXT: &str = "Упс, что-то пошло не так, но админ уже спешит на помощь! 👨‍🦽";

/// 带顶层键盘的消息
pub fn top_menu(text: &str) -> OutboundMessage {
    OutboundMessage::text(text).keyboard(vec![
        vec![
            Button::callback("Написать в канал", callbacks::POST_CHANNEL_START),
            Button::callback("Вспомнить принципы", callbacks::PRINCIPLES_START),
        ],
        vec![Button::callback("Позвать на помощь", callbacks::SOS_START)],
    ])
}

pub fn help_message(bot: &BotSection) -> OutboundMessage {
    let link = bot.board_link.as_deref().unwrap_or_default();
    OutboundMessage::text(format!(
        "Давай расскажу, что я умею!\n\n\
         Во-первых, через меня ты можешь написать в <a href=\"{link}\">общий канал</a> Холодка, \
         от своего имени или анонимно.\n\n\
         Во-вторых, здесь можно вспомнить 10 принципов Burning Man, по которым живет наше сообщество, \
         и найти телефон для экстренной связи со штабом"
    ))
    .html()
}

pub fn on_start(ctx: &mut Context<'_>, bot: &BotSection) -> anyhow::Result<()> {
    ctx.reply(help_message(bot));
    ctx.reply(top_menu(TOP_TEXT));
    ctx.register_user();
    Ok(())
}

pub fn on_help(ctx: &mut Context<'_>, bot: &BotSection) -> anyhow::Result<()> {
    ctx.reply(help_message(bot));
    Ok(())
}

pub fn on_top(ctx: &mut Context<'_>) -> anyhow::Result<()> {
    ctx.reply(top_menu(TOP_TEXT));
    Ok(())
}

pub fn sos_start(ctx: &mut Context<'_>) -> anyhow::Result<()> {
    ctx.reply(
        OutboundMessage::text(
            "Телефон для экстренной связи со штабом: ... .\n\n\
             Это не инфоцентр, а номер на случай действительно экстренной ситуации. \
             Во всех остальных случаях просьба передавать информацию через чаты или рации",
        )
        .html()
        .no_preview()
        .keyboard(vec![vec![Button::callback("Назад", callbacks::SOS_STOP)]]),
    );
    Ok(())
}

/// `симсалабим` 口令：回显媒体的类型与 file_id，便于维护者取得文件引用
pub fn on_media(ctx: &mut Context<'_>) -> anyhow::Result<()> {
    let media = ctx
        .event()
        .message()
        .and_then(|m| m.media.clone())
        .ok_or_else(|| anyhow::anyhow!("media handler matched a message without media"))?;
    let kind = serde_json::to_value(media.kind)?;
    let kind = kind.as_str().unwrap_or_default();
    ctx.reply(top_menu(&format!("file type: {}, file id: {}", kind, media.file_id)));
    Ok(())
}

pub fn on_unknown(ctx: &mut Context<'_>) -> anyhow::Result<()> {
    ctx.reply(top_menu(UNKNOWN_TEXT));
    Ok(())
}

/// 使用次数统计，运行在独立分组，与业务分组并行
pub fn on_every(ctx: &mut Context<'_>) -> anyhow::Result<()> {
    ctx.track_usage();
    Ok(())
}

/// HTML 格式的用户提及
pub fn mention_html(user: &UserRef) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        user.id,
        escape_html(&user.full_name())
    )
}
