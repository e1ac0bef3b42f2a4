//! Telegram bot client - long polling dispatcher.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::RequestError;

use crate::core::Router;
use crate::error::Error;

use super::commands::bot_commands;
use super::handler::{choice_from, deliver, inbound_from};

/// Run the telegram bot until interrupted.
pub async fn run_telegram_daemon(token: String, router: Arc<Router>) -> Result<(), Error> {
    tracing::info!("Starting Telegram bot...");

    let bot = Bot::new(token);

    let me = bot
        .get_me()
        .await
        .map_err(|e| Error::Telegram(format!("cannot reach Telegram: {}", e)))?;
    tracing::info!("Connected as @{}", me.username());

    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        tracing::warn!("Failed to set commands: {}", e);
    }

    tracing::info!("Telegram bot commands set");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("Telegram bot stopped");
    Ok(())
}

/// Handle incoming messages.
async fn handle_message(bot: Bot, msg: Message, router: Arc<Router>) -> Result<(), RequestError> {
    let Some(inbound) = inbound_from(&msg) else {
        return Ok(());
    };
    tracing::debug!(
        "Message from {} in chat {}: {}",
        inbound.sender.label(),
        inbound.chat_id,
        inbound.text
    );

    let replies = router.handle_message(&inbound).await;
    deliver(&bot, inbound.chat_id, replies).await;
    Ok(())
}

/// Handle inline button presses.
async fn handle_callback(bot: Bot, query: CallbackQuery, router: Arc<Router>) -> Result<(), RequestError> {
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        tracing::warn!("Failed to answer callback query: {}", e);
    }

    let Some(selected) = choice_from(&query) else {
        tracing::debug!("Callback query without data or chat ignored");
        return Ok(());
    };
    tracing::debug!(
        "Choice {} from {} in chat {}",
        selected.choice_id,
        selected.sender.label(),
        selected.chat_id
    );

    let replies = router.handle_choice(&selected).await;
    deliver(&bot, selected.chat_id, replies).await;
    Ok(())
}
