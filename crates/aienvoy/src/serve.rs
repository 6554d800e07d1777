// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `aienvoy serve` command implementation.
//!
//! Opens SQLite storage, registers the configured providers, then runs the
//! HTTP gateway and (when a bot token is set) the Telegram bot until a
//! shutdown signal arrives.

use std::sync::Arc;

use aienvoy_config::AienvoyConfig;
use aienvoy_core::{EnvoyError, StorageAdapter};
use aienvoy_gateway::{GatewayState, HealthState, ServerConfig};
use aienvoy_llm::ConversationService;
use aienvoy_prometheus::PrometheusAdapter;
use aienvoy_storage::SqliteStorage;
use aienvoy_telegram::TelegramBot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{providers, shutdown};

/// Storage, registry and service, as every subcommand needs them.
pub struct Runtime {
    pub storage: Arc<SqliteStorage>,
    pub service: ConversationService,
}

impl Runtime {
    pub async fn open(config: &AienvoyConfig) -> Result<Self, EnvoyError> {
        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;

        let registry = Arc::new(providers::build_registry(config).await?);
        let service =
            ConversationService::new(registry, Arc::clone(&storage) as Arc<dyn StorageAdapter>);
        Ok(Self { storage, service })
    }

    /// Shuts providers down and checkpoints storage.
    pub async fn close(self) -> Result<(), EnvoyError> {
        self.service.registry().shutdown_all().await;
        self.storage.close().await
    }
}

type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

fn install_metrics(config: &AienvoyConfig) -> Option<MetricsRender> {
    if !config.prometheus.enabled {
        info!("prometheus metrics disabled");
        return None;
    }
    match PrometheusAdapter::new() {
        Ok(adapter) => {
            let adapter = Arc::new(adapter);
            Some(Arc::new(move || adapter.render()))
        }
        Err(e) => {
            warn!(error = %e, "prometheus metrics unavailable");
            None
        }
    }
}

/// Runs the server until SIGINT/SIGTERM.
pub async fn run_serve(config: AienvoyConfig) -> Result<(), EnvoyError> {
    info!(
        name = %config.service.name,
        env = %config.service.env,
        "starting aienvoy serve"
    );

    let prometheus_render = install_metrics(&config);
    let runtime = Runtime::open(&config).await?;
    let cancel = shutdown::install_signal_handler();

    let telegram = spawn_telegram(&config, &runtime.service, cancel.clone())?;

    let state = GatewayState {
        service: runtime.service.clone(),
        health: HealthState::new(prometheus_render),
    };
    let server_config = ServerConfig {
        host: config.service.host.clone(),
        port: config.service.port,
    };
    if let Some(url) = &config.service.url {
        info!(%url, "public url");
    }

    let served = aienvoy_gateway::start_server(&server_config, state, cancel.clone()).await;
    if let Err(e) = &served {
        error!(error = %e, "gateway stopped with error");
    }

    // Stop the bot whether the gateway exited by signal or by failure.
    cancel.cancel();
    if let Some(handle) = telegram
        && let Err(e) = handle.await
    {
        warn!(error = %e, "telegram task ended abnormally");
    }

    runtime.close().await?;
    info!("aienvoy serve shutdown complete");
    served
}

fn spawn_telegram(
    config: &AienvoyConfig,
    service: &ConversationService,
    cancel: CancellationToken,
) -> Result<Option<tokio::task::JoinHandle<()>>, EnvoyError> {
    if config.telegram.bot_token.is_none() {
        info!("telegram disabled, no bot token configured");
        return Ok(None);
    }
    if config.telegram.allowed_users.is_empty() {
        warn!("telegram.allowed_users is empty, every message will be ignored");
    }

    let bot = TelegramBot::new(&config.telegram, service.clone())?;
    Ok(Some(tokio::spawn(async move { bot.run(cancel).await })))
}
