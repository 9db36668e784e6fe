//! post_channel_conv：向公告频道投稿
//!
//! GetMessage（文本或单个媒体）→ GetPrivacy（署名 / 匿名）→ GetSendingConfirmation → 结束。
//! 草稿与署名页脚保存在暂存区，结束、中止或 unknown 时清除。

use std::sync::Arc;

use super::callbacks;
use super::menu::{mention_html, top_menu};
use crate::config::BotSection;
use crate::conversation::{ConversationBuilder, ConversationDefinition, ConversationState, Next};
use crate::core::EngineError;
use crate::messaging::{
    escape_html, utf16_len, Button, MediaKind, OutboundMessage, MAX_CAPTION_LENGTH, MAX_MESSAGE_LENGTH,
};
use crate::router::{Context, Matcher};

pub const NAME: &str = "post_channel_conv";

pub const KEY_MESSAGE: &str = "post_channel_message";
pub const KEY_MESSAGE_TYPE: &str = "post_channel_message_type";
pub const KEY_FILE_ID: &str = "post_channel_file_id";
pub const KEY_FULL_MESSAGE: &str = "post_channel_full_message";
pub const KEY_PUBLIC_FOOTER: &str = "post_channel_public_footer";
pub const KEY_PRIVATE_FOOTER: &str = "post_channel_private_footer";
pub const KEY_FOOTER_MAX_LENGTH: &str = "post_channel_footer_max_length";

/// 进行中投稿的暂存键
pub const TRANSIENT_KEYS: [&str; 7] = [
    KEY_MESSAGE,
    KEY_MESSAGE_TYPE,
    KEY_FILE_ID,
    KEY_FULL_MESSAGE,
    KEY_PUBLIC_FOOTER,
    KEY_PRIVATE_FOOTER,
    KEY_FOOTER_MAX_LENGTH,
];

const TEXT_TYPE: &str = "TEXT";

/// 可投稿的媒体类型（语音与相册不支持）
const POSTABLE_MEDIA: [MediaKind; 5] = [
    MediaKind::Animation,
    MediaKind::Audio,
    MediaKind::Document,
    MediaKind::Photo,
    MediaKind::Video,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostChannelState {
    GetMessage,
    GetPrivacy,
    GetSendingConfirmation,
}

impl ConversationState for PostChannelState {
    const ALL: &'static [Self] = &[
        PostChannelState::GetMessage,
        PostChannelState::GetPrivacy,
        PostChannelState::GetSendingConfirmation,
    ];

    fn token(self) -> &'static str {
        match self {
            PostChannelState::GetMessage => "POST_CHANNEL_GET_MESSAGE",
            PostChannelState::GetPrivacy => "POST_CHANNEL_GET_PRIVACY",
            PostChannelState::GetSendingConfirmation => "POST_CHANNEL_GET_SENDING_CONFIRMATION",
        }
    }
}

pub fn conversation(bot: Arc<BotSection>) -> Result<ConversationDefinition<PostChannelState>, EngineError> {
    let start_bot = Arc::clone(&bot);
    let confirm_bot = Arc::clone(&bot);

    let content = Matcher::Text
        .or(Matcher::Media(POSTABLE_MEDIA.to_vec()))
        .and(!Matcher::MediaGroup);

    ConversationBuilder::new(NAME)
        .allow_reentry(true)
        .entry(Matcher::command("publish"), move |ctx| start(ctx, &start_bot))
        .entry(Matcher::callback(callbacks::POST_CHANNEL_START), move |ctx| start(ctx, &bot))
        .on(PostChannelState::GetMessage, content, message)
        .on(
            PostChannelState::GetPrivacy,
            Matcher::callback(callbacks::POST_CHANNEL_PUBLIC).or(Matcher::callback(callbacks::POST_CHANNEL_PRIVATE)),
            privacy,
        )
        .on(
            PostChannelState::GetSendingConfirmation,
            Matcher::callback(callbacks::POST_CHANNEL_CONFIRM_SENDING),
            move |ctx| confirm_sending(ctx, &confirm_bot),
        )
        .fallback(Matcher::callback(callbacks::POST_CHANNEL_STOP), stop)
        .build()
}

fn start(ctx: &mut Context<'_>, bot: &BotSection) -> anyhow::Result<Next<PostChannelState>> {
    let public_footer = format!("\n\n — {}", mention_html(ctx.user()));
    let private_footer = "\n\n — Аноним".to_string();
    let footer_max = utf16_len(&public_footer).max(utf16_len(&private_footer));

    let state = ctx.state_mut();
    state.set(KEY_PUBLIC_FOOTER, public_footer);
    state.set(KEY_PRIVATE_FOOTER, private_footer);
    state.set(KEY_FOOTER_MAX_LENGTH, footer_max);

    let link = bot.board_link.as_deref().unwrap_or_default();
    ctx.reply(
        OutboundMessage::text(format!(
            "Напиши мне сообщение, которое нужно отправить в общий <a href=\"{link}\">канал</a>.\n\n\
             Отправить сообщение можно от своего имени или анонимно. \
             Это может быть текстовое сообщение или медиа с подписью или без (например, фото или видео), \
             но не альбом из них."
        ))
        .html()
        .keyboard(vec![vec![Button::callback("Назад", callbacks::POST_CHANNEL_STOP)]]),
    );
    Ok(Next::To(PostChannelState::GetMessage))
}

fn message(ctx: &mut Context<'_>) -> anyhow::Result<Next<PostChannelState>> {
    let incoming = ctx
        .event()
        .message()
        .ok_or_else(|| anyhow::anyhow!("post_channel message handler matched a non-message event"))?;

    let (body, max_length) = match (&incoming.text, &incoming.caption) {
        (Some(text), _) => (text.as_str(), MAX_MESSAGE_LENGTH),
        (None, Some(caption)) => (caption.as_str(), MAX_CAPTION_LENGTH),
        (None, None) => ("", MAX_CAPTION_LENGTH),
    };
    let footer_max = ctx.state().get::<usize>(KEY_FOOTER_MAX_LENGTH).unwrap_or_default();

    // 上限按 UTF-16 码元计；HTML 标签不计入长度，页脚按其原文估算
    if utf16_len(body) + footer_max > max_length {
        ctx.reply(
            OutboundMessage::text(format!(
                "Сообщение получилось слишком длинным, максимум {} символов. Попробуй еще раз",
                max_length.saturating_sub(footer_max)
            ))
            .keyboard(vec![vec![Button::callback("Назад", callbacks::POST_CHANNEL_STOP)]]),
        );
        return Ok(Next::Stay);
    }

    let escaped = escape_html(body);
    let state = ctx.state_mut();
    state.set(KEY_MESSAGE, escaped);
    match (&incoming.text, &incoming.media) {
        (Some(_), _) => {
            state.set(KEY_MESSAGE_TYPE, TEXT_TYPE);
            state.remove(KEY_FILE_ID);
        }
        (None, Some(media)) => {
            state.set(KEY_MESSAGE_TYPE, serde_json::to_value(media.kind)?);
            state.set(KEY_FILE_ID, media.file_id.clone());
        }
        (None, None) => anyhow::bail!("post_channel message has neither text nor media"),
    }

    ctx.reply(
        OutboundMessage::text("Отлично, будем посылать сообщение в канал от твоего имени или анонимно?").keyboard(vec![
            vec![
                Button::callback("От меня", callbacks::POST_CHANNEL_PUBLIC),
                Button::callback("Анонимно", callbacks::POST_CHANNEL_PRIVATE),
                Button::callback("Отмена", callbacks::POST_CHANNEL_STOP),
            ],
        ]),
    );
    Ok(Next::To(PostChannelState::GetPrivacy))
}

/// 按暂存的类型重建待发送的消息
fn draft(ctx: &Context<'_>, text: String) -> anyhow::Result<OutboundMessage> {
    let state = ctx.state();
    match state.get_str(KEY_MESSAGE_TYPE) {
        Some(TEXT_TYPE) => Ok(OutboundMessage::text(text).html()),
        Some(_) => {
            let kind: MediaKind = state
                .get(KEY_MESSAGE_TYPE)
                .ok_or_else(|| anyhow::anyhow!("unsupported post_channel message type"))?;
            let file_id = state
                .get_str(KEY_FILE_ID)
                .ok_or_else(|| anyhow::anyhow!("post_channel file id is missing"))?;
            Ok(OutboundMessage::media(kind, file_id, text).html())
        }
        None => anyhow::bail!("post_channel message type is missing"),
    }
}

fn privacy(ctx: &mut Context<'_>) -> anyhow::Result<Next<PostChannelState>> {
    let footer_key = match ctx.event().callback_data() {
        Some(callbacks::POST_CHANNEL_PUBLIC) => KEY_PUBLIC_FOOTER,
        _ => KEY_PRIVATE_FOOTER,
    };
    let state = ctx.state();
    let full = format!(
        "{}{}",
        state.get_str(KEY_MESSAGE).unwrap_or_default(),
        state.get_str(footer_key).unwrap_or_default()
    );
    let preview = draft(ctx, full.clone())?;
    ctx.state_mut().set(KEY_FULL_MESSAGE, full);

    ctx.reply(OutboundMessage::text("Хорошо, вот так будет выглядеть твое сообщение для всех участников:"));
    ctx.reply(preview.force_new());
    ctx.reply(
        OutboundMessage::text("Отправляем?")
            .keyboard(vec![vec![
                Button::callback("Да!", callbacks::POST_CHANNEL_CONFIRM_SENDING),
                Button::callback("Нет 💁‍♂️", callbacks::POST_CHANNEL_STOP),
            ]])
            .force_new(),
    );
    Ok(Next::To(PostChannelState::GetSendingConfirmation))
}

fn confirm_sending(ctx: &mut Context<'_>, bot: &BotSection) -> anyhow::Result<Next<PostChannelState>> {
    let board = bot
        .board_chat_id
        .ok_or_else(|| anyhow::anyhow!("bot.board_chat_id is not configured"))?;
    let full = ctx.state().get_str(KEY_FULL_MESSAGE).unwrap_or_default().to_string();
    let post = draft(ctx, full)?;

    ctx.send_to(board, post);
    let link = bot.board_link.as_deref().unwrap_or_default();
    ctx.reply(top_menu(&format!("<a href=\"{link}\">Готово!</a>\n\nЧто хочешь сделать теперь?")).html());
    ctx.state_mut().remove_keys(TRANSIENT_KEYS);
    Ok(Next::End)
}

fn stop(ctx: &mut Context<'_>) -> anyhow::Result<Next<PostChannelState>> {
    ctx.reply(top_menu(super::menu::TOP_TEXT));
    ctx.state_mut().remove_keys(TRANSIENT_KEYS);
    Ok(Next::End)
}
