use std::sync::Arc;
use teloxide::dispatching::DefaultKey;
use teloxide::prelude::*;
use teloxide::types::ReplyParameters;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::chat_handler::ChatHandler;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Failed to build Telegram HTTP client: {0}")]
    Client(String),

    #[error("Telegram startup check failed: {0}")]
    Startup(#[from] teloxide::RequestError),
}

/// Builds the bot client without system proxy detection
pub fn build_bot(token: &str) -> Result<Bot, BotError> {
    let client = teloxide::net::default_reqwest_settings()
        .no_proxy()
        .build()
        .map_err(|e| BotError::Client(e.to_string()))?;
    Ok(Bot::with_client(token.to_string(), client))
}

type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Message endpoint plus a silent fallback for every other update kind
fn dispatcher(bot: Bot, handler: Arc<ChatHandler>) -> Dispatcher<Bot, HandlerError, DefaultKey> {
    let message_handler = Update::filter_message().endpoint(
        |bot: Bot, msg: Message, handler: Arc<ChatHandler>| async move {
            let user_id = msg.from.as_ref().map(|user| user.id.0);
            let Some(reply) = handler.handle(user_id, msg.text()).await else {
                return Ok(());
            };

            let mut request = bot
                .send_message(msg.chat.id, reply.text())
                .reply_parameters(ReplyParameters::new(msg.id));
            if reply.shows_menu() {
                request = request.reply_markup(handler.menu().keyboard());
            }
            if let Err(e) = request.await {
                error!("Failed to reply in chat {}: {}", msg.chat.id, e);
            }

            Ok::<(), HandlerError>(())
        },
    );

    Dispatcher::builder(bot, message_handler)
        .dependencies(dptree::deps![handler])
        .default_handler(|update| async move {
            debug!("Ignoring update {:?}", update.kind);
        })
        .build()
}

/// Long-polls Telegram and answers through the [`ChatHandler`] until shutdown
pub async fn run_bot(
    bot: Bot,
    handler: Arc<ChatHandler>,
    shutdown: CancellationToken,
) -> Result<(), BotError> {
    let me = bot.get_me().await?;
    info!("Telegram bot @{} connected", me.username());

    let mut dispatcher = dispatcher(bot, handler);

    info!("Bot listening...");
    tokio::select! {
        _ = dispatcher.dispatch() => info!("Telegram dispatcher completed"),
        _ = shutdown.cancelled() => info!("Telegram bot shutting down"),
    }
    Ok(())
}
