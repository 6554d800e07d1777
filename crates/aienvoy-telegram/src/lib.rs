// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram bot front end for aienvoy.
//!
//! Long-polls the Bot API via teloxide. Each authorized private chat is
//! backed by one stored conversation, and replies are streamed into the
//! chat by editing messages in place.

pub mod handler;
pub mod markdown;
pub mod streaming;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use aienvoy_config::model::TelegramConfig;
use aienvoy_core::{AdapterType, EnvoyError, HealthStatus, PluginAdapter};
use aienvoy_llm::ConversationService;

pub use handler::ChatContext;
pub use streaming::{BotOutbox, Outbox, StreamingEditor};

/// The Telegram bot: a teloxide [`Bot`] plus what its handler needs.
pub struct TelegramBot {
    bot: Bot,
    allowed_users: Arc<Vec<String>>,
    context: Arc<ChatContext>,
}

impl TelegramBot {
    /// Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig, service: ConversationService) -> Result<Self, EnvoyError> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| EnvoyError::Config("telegram.bot_token is required".into()))?;

        Ok(Self {
            bot: Bot::new(token),
            allowed_users: Arc::new(config.allowed_users.clone()),
            context: Arc::new(ChatContext {
                service,
                model: config.model.clone(),
            }),
        })
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Polls for updates until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let allowed_users = Arc::clone(&self.allowed_users);
        let context = Arc::clone(&self.context);

        let endpoint = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let allowed = Arc::clone(&allowed_users);
            let ctx = Arc::clone(&context);
            async move {
                handle_message(bot, msg, &allowed, &ctx).await;
                respond(())
            }
        });

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), endpoint)
            .default_handler(|_| async {})
            .build();

        let token = dispatcher.shutdown_token();
        let watcher = tokio::spawn(async move {
            shutdown.cancelled().await;
            loop {
                match token.shutdown() {
                    Ok(stopped) => {
                        stopped.await;
                        break;
                    }
                    // The dispatcher has not started polling yet.
                    Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
                }
            }
        });

        info!(allowed_users = self.allowed_users.len(), "starting Telegram long polling");
        dispatcher.dispatch().await;
        watcher.abort();
        info!("Telegram polling stopped");
    }
}

async fn handle_message(bot: Bot, msg: Message, allowed_users: &[String], ctx: &ChatContext) {
    if !handler::is_dm(&msg) {
        debug!(chat_id = msg.chat.id.0, "ignoring non-DM message");
        return;
    }
    if !handler::is_authorized(&msg, allowed_users) {
        debug!(chat_id = msg.chat.id.0, "ignoring unauthorized user");
        return;
    }
    let Some(text) = msg.text() else {
        debug!(msg_id = msg.id.0, "ignoring non-text message");
        return;
    };

    aienvoy_prometheus::record_telegram_message();

    let typing = CancellationToken::new();
    let indicator = streaming::start_typing_indicator(bot.clone(), msg.chat.id, typing.clone());
    let outbox = BotOutbox::new(bot, msg.chat.id);

    // Failures are logged and reported to the chat by `answer`.
    let _ = handler::answer(
        ctx,
        outbox,
        msg.chat.id.0,
        handler::caller_for(&msg),
        text,
        &typing,
    )
    .await;

    typing.cancel();
    let _ = indicator.await;
}

#[async_trait]
impl PluginAdapter for TelegramBot {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, EnvoyError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), EnvoyError> {
        debug!("Telegram bot shutting down");
        Ok(())
    }
}
