//! principles_conv：分页浏览 10 条原则

use super::callbacks;
use super::menu::{top_menu, TOP_TEXT};
use crate::conversation::{ConversationBuilder, ConversationDefinition, ConversationState, Next};
use crate::core::EngineError;
use crate::messaging::{Button, OutboundMessage};
use crate::router::{Context, Matcher};

pub const NAME: &str = "principles_conv";

const PAGES_PER_ROW: usize = 5;

const DESCRIPTION: &str = "<b>10 принципов Burning Man</b>\n\n\
    Принципы были сформулированы в 2004 году как описание культуры, сложившейся вокруг события. \
    Выбери номер, чтобы прочитать подробнее";

const PRINCIPLES: [&str; 10] = [
    "<b>1. Радикальная инклюзивность</b>\n\nЛюбой может стать частью сообщества.",
    "<b>2. Дарение</b>\n\nЦенность подарка безусловна и не подразумевает ответа.",
    "<b>3. Декоммерциализация</b>\n\nМы не заменяем участие потреблением.",
    "<b>4. Радикальная самостоятельность</b>\n\nКаждый опирается на собственные внутренние ресурсы.",
    "<b>5. Радикальное самовыражение</b>\n\nСамовыражение определяется самим человеком.",
    "<b>6. Совместные усилия</b>\n\nМы ценим творческое сотрудничество.",
    "<b>7. Гражданская ответственность</b>\n\nМы ценим гражданское общество и общественное благо.",
    "<b>8. Не оставлять следов</b>\n\nМы уважаем окружающую среду.",
    "<b>9. Участие</b>\n\nПреобразования происходят только через глубокое личное участие.",
    "<b>10. Непосредственность</b>\n\nНепосредственный опыт важнее любых посредников.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrinciplesState {
    ChooseAction,
}

impl ConversationState for PrinciplesState {
    const ALL: &'static [Self] = &[PrinciplesState::ChooseAction];

    fn token(self) -> &'static str {
        match self {
            PrinciplesState::ChooseAction => "PRINCIPLES_CHOOSE_ACTION",
        }
    }
}

pub fn conversation() -> Result<ConversationDefinition<PrinciplesState>, EngineError> {
    ConversationBuilder::new(NAME)
        .allow_reentry(true)
        .entry(Matcher::command("principles"), start)
        .entry(Matcher::callback(callbacks::PRINCIPLES_START), start)
        .on(
            PrinciplesState::ChooseAction,
            Matcher::callback_prefix(callbacks::PRINCIPLES_PAGE),
            page,
        )
        .fallback(Matcher::callback(callbacks::PRINCIPLES_STOP), stop)
        .build()
}

/// 页码按钮 + 返回按钮；当前页以 ·n· 标出
fn paginator(current: Option<usize>) -> Vec<Vec<Button>> {
    let numbers: Vec<Button> = (1..=PRINCIPLES.len())
        .map(|n| {
            let label = if Some(n) == current {
                format!("·{n}·")
            } else {
                n.to_string()
            };
            Button::callback(label, format!("{}#{}", callbacks::PRINCIPLES_PAGE, n))
        })
        .collect();

    let mut rows: Vec<Vec<Button>> = numbers.chunks(PAGES_PER_ROW).map(<[Button]>::to_vec).collect();
    rows.push(vec![Button::callback("Назад", callbacks::PRINCIPLES_STOP)]);
    rows
}

fn start(ctx: &mut Context<'_>) -> anyhow::Result<Next<PrinciplesState>> {
    ctx.reply(OutboundMessage::text(DESCRIPTION).html().keyboard(paginator(None)));
    Ok(Next::To(PrinciplesState::ChooseAction))
}

fn page(ctx: &mut Context<'_>) -> anyhow::Result<Next<PrinciplesState>> {
    let data = ctx.event().callback_data().unwrap_or_default();
    let number: usize = data
        .split_once('#')
        .map(|(_, n)| n)
        .ok_or_else(|| anyhow::anyhow!("callback {data:?} has no page number"))?
        .parse()?;
    let text = number
        .checked_sub(1)
        .and_then(|i| PRINCIPLES.get(i))
        .ok_or_else(|| anyhow::anyhow!("page {number} is out of range"))?;

    ctx.reply(OutboundMessage::text(*text).html().keyboard(paginator(Some(number))));
    Ok(Next::Stay)
}

fn stop(ctx: &mut Context<'_>) -> anyhow::Result<Next<PrinciplesState>> {
    ctx.reply(top_menu(TOP_TEXT));
    Ok(Next::End)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginator_marks_current_page() {
        let rows = paginator(Some(7));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][1].text, "·7·");
        assert_eq!(rows[1][1].callback_data, "PRINCIPLES_PAGE#7");
        assert_eq!(rows[2][0].callback_data, callbacks::PRINCIPLES_STOP);
    }

    #[test]
    fn test_conversation_builds() {
        assert!(conversation().is_ok());
    }
}
