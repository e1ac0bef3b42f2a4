//! Translation between Telegram updates and router types.

use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, MessageEntityKind, User,
};

use crate::core::{Choice, ChoiceSelected, Inbound, Reply, Sender};

/// Telegram rejects longer messages; keep some headroom.
pub const MAX_MESSAGE_CHARS: usize = 4000;

pub fn sender_from(user: &User) -> Sender {
    Sender {
        id: user.id.0,
        username: user.username.clone(),
        display_name: user.full_name(),
    }
}

/// Users mentioned in a message: `@mention` entities verbatim, text mentions
/// as the user's `@username` or, lacking one, their full name.
pub fn mentions(msg: &Message) -> Vec<String> {
    msg.parse_entities()
        .unwrap_or_default()
        .iter()
        .filter_map(|entity| match entity.kind() {
            MessageEntityKind::Mention => Some(entity.text().to_string()),
            MessageEntityKind::TextMention { user } => Some(
                user.username
                    .as_ref()
                    .map(|u| format!("@{}", u))
                    .unwrap_or_else(|| user.full_name()),
            ),
            _ => None,
        })
        .collect()
}

/// Build the router input for a text message. Non-text messages and
/// messages without an author are skipped.
pub fn inbound_from(msg: &Message) -> Option<Inbound> {
    let text = msg.text()?;
    let user = msg.from.as_ref()?;
    Some(Inbound {
        chat_id: msg.chat.id.0,
        sender: sender_from(user),
        text: text.to_string(),
        reply_to: msg
            .reply_to_message()
            .and_then(|replied| replied.text())
            .map(str::to_string),
        mentions: mentions(msg),
    })
}

/// Build the router input for a pressed inline button.
pub fn choice_from(query: &CallbackQuery) -> Option<ChoiceSelected> {
    let choice_id = query.data.clone()?;
    let chat_id = query.message.as_ref()?.chat().id.0;
    Some(ChoiceSelected {
        chat_id,
        sender: sender_from(&query.from),
        choice_id,
    })
}

pub fn keyboard(choices: &[Choice]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        choices
            .iter()
            .map(|c| vec![InlineKeyboardButton::callback(c.label.clone(), c.id.clone())]),
    )
}

/// Split text into Telegram-sized pieces, preferring line breaks.
pub fn split_for_telegram(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        if current.chars().count() + line.chars().count() > MAX_MESSAGE_CHARS && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if line.chars().count() > MAX_MESSAGE_CHARS {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(MAX_MESSAGE_CHARS) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Send replies in order. Failures are logged and not retried.
pub async fn deliver(bot: &Bot, chat_id: i64, replies: Vec<Reply>) {
    for reply in replies {
        let result = match reply {
            Reply::Text(text) => {
                let mut result = Ok(());
                for chunk in split_for_telegram(&text) {
                    if let Err(e) = bot.send_message(ChatId(chat_id), chunk).await {
                        result = Err(e);
                        break;
                    }
                }
                result
            }
            Reply::Choices { text, choices } => bot
                .send_message(ChatId(chat_id), text)
                .reply_markup(keyboard(&choices))
                .await
                .map(|_| ()),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to send reply to chat {}: {}", chat_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(split_for_telegram("hello\nworld"), vec!["hello\nworld".to_string()]);
        assert!(split_for_telegram("").is_empty());
    }

    #[test]
    fn test_long_text_splits_on_lines() {
        let line = format!("{}\n", "x".repeat(1500));
        let text = line.repeat(3);
        let chunks = split_for_telegram(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], line.repeat(2));
        assert_eq!(chunks[1], line);
    }

    #[test]
    fn test_overlong_line_is_cut() {
        let text = "y".repeat(MAX_MESSAGE_CHARS * 2 + 10);
        let chunks = split_for_telegram(&text);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_MESSAGE_CHARS));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_keyboard_one_button_per_row() {
        let choices = vec![
            Choice {
                id: "project:1".to_string(),
                label: "Alpha".to_string(),
            },
            Choice {
                id: "project:2".to_string(),
                label: "Beta".to_string(),
            },
        ];
        let markup = keyboard(&choices);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[1][0].text, "Beta");
    }
}
