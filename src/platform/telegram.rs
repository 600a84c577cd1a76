use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use reqwest::Url;
use teloxide::types::{ChatAction, ChatId};
use teloxide::update_listeners::webhooks;
use tracing::{info, warn};

use crate::config::{Config, IngressMode};
use crate::platform::{IncomingMessage, OutgoingReply};
use crate::relay::Relay;

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

/// Run the Telegram ingress in the configured mode. Both modes funnel every
/// text update through the same relay call.
pub async fn run(relay: Arc<Relay>, config: &Config) -> Result<()> {
    let bot = Bot::new(&config.telegram.bot_token);

    let handler = Update::filter_message().endpoint(handle_message);

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![relay])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build();

    match config.ingress.mode {
        IngressMode::Polling => {
            info!("Starting Telegram long-polling ingress...");
            dispatcher.dispatch().await;
        }
        IngressMode::Webhook => {
            let addr = SocketAddr::from(([0, 0, 0, 0], config.ingress.port));
            let url: Url = format!(
                "{}/webhook",
                config.ingress.webhook_base_url.trim_end_matches('/')
            )
            .parse()
            .context("Invalid ingress.webhook_base_url")?;

            info!("Starting Telegram webhook ingress on {} for {}", addr, url);

            // set_webhook is awaited here, so registration is complete before
            // the dispatcher starts accepting traffic.
            let listener = webhooks::axum(bot, webhooks::Options::new(addr, url))
                .await
                .context("Failed to register Telegram webhook")?;

            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("webhook listener"),
                )
                .await;
        }
    }

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, relay: Arc<Relay>) -> ResponseResult<()> {
    // Non-text updates (photos, stickers, ...) carry nothing to relay.
    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    info!("Message in chat {}: {} chars", msg.chat.id, text.len());

    // Send "typing" indicator
    bot.send_chat_action(msg.chat.id, ChatAction::Typing)
        .await
        .ok();

    let incoming = IncomingMessage {
        chat_id: msg.chat.id.0.to_string(),
        text,
    };

    let reply = relay.handle(&incoming).await;
    deliver(&bot, &reply).await;

    Ok(())
}

/// Send one reply to its chat, chunked to fit Telegram's message size limit.
/// Send errors are logged and dropped; the relay cycle is already complete.
async fn deliver(bot: &Bot, reply: &OutgoingReply) {
    let chat_id = match reply.chat_id.parse::<i64>() {
        Ok(id) => ChatId(id),
        Err(_) => {
            warn!("Cannot deliver reply: bad chat id {:?}", reply.chat_id);
            return;
        }
    };

    for chunk in split_message(&reply.text, 4000) {
        if let Err(e) = bot.send_message(chat_id, chunk).await {
            warn!("Failed to send reply to chat {}: {}", chat_id, e);
        }
    }
}
