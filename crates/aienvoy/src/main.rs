// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aienvoy - a personal assistant backend.
//!
//! This is the binary entry point.

mod providers;
mod serve;
mod shutdown;

use std::io::{self, Write};
use std::path::PathBuf;

use aienvoy_config::AienvoyConfig;
use aienvoy_core::{Caller, ChatMessage, ChatRequest, EnvoyError, StreamEvent};
use aienvoy_llm::ModelEntry;
use clap::{Parser, Subcommand};

use crate::serve::Runtime;

/// Aienvoy - a personal assistant backend for many LLM providers.
#[derive(Parser, Debug)]
#[command(name = "aienvoy", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG lookup.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP gateway and the Telegram bot.
    Serve,
    /// List every routable model and the provider serving it.
    Models {
        /// Ask the configured OpenAI endpoints instead of the local registry.
        #[arg(long)]
        upstream: bool,
    },
    /// Send one prompt and stream the answer to stdout.
    Chat {
        /// Model to ask.
        #[arg(short, long)]
        model: String,
        /// Wait for the full answer instead of streaming it.
        #[arg(long)]
        no_stream: bool,
        /// The prompt; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => aienvoy_config::load_and_validate_path(path),
        None => aienvoy_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            aienvoy_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.service.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Models { upstream } => run_models(&config, upstream).await,
        Commands::Chat {
            model,
            no_stream,
            prompt,
        } => run_chat(&config, model, prompt.join(" "), !no_stream).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Local output failures are ours, not the upstream's.
fn stdout_error(e: io::Error) -> EnvoyError {
    EnvoyError::Internal(format!("writing to stdout failed: {e}"))
}

fn write_models(mut out: impl Write, models: &[ModelEntry]) -> Result<(), EnvoyError> {
    for model in models {
        writeln!(out, "{}\t{}", model.id, model.owned_by).map_err(stdout_error)?;
    }
    out.flush().map_err(stdout_error)
}

async fn run_models(config: &AienvoyConfig, upstream: bool) -> Result<(), EnvoyError> {
    if upstream {
        let models = providers::upstream_models(config).await?;
        return write_models(io::stdout().lock(), &models);
    }
    let runtime = Runtime::open(config).await?;
    let written = write_models(io::stdout().lock(), runtime.service.list_models());
    runtime.close().await?;
    written
}

async fn run_chat(
    config: &AienvoyConfig,
    model: String,
    prompt: String,
    stream: bool,
) -> Result<(), EnvoyError> {
    let runtime = Runtime::open(config).await?;
    let caller = Caller::new("cli");
    let request = ChatRequest {
        model,
        messages: vec![ChatMessage::user(prompt)],
        stream,
        ..Default::default()
    };

    let answered = if stream {
        print_stream(&runtime, caller, request).await
    } else {
        match runtime.service.create_chat_completion(&caller, request).await {
            Ok(response) => writeln!(io::stdout(), "{}", response.content).map_err(stdout_error),
            Err(e) => Err(e),
        }
    };

    runtime.close().await?;
    answered
}

async fn print_stream(
    runtime: &Runtime,
    caller: Caller,
    request: ChatRequest,
) -> Result<(), EnvoyError> {
    let mut stream = runtime
        .service
        .create_chat_completion_stream(caller, request);
    let mut stdout = io::stdout();
    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::Delta(delta) => {
                write!(stdout, "{}", delta.delta_text).map_err(stdout_error)?;
                stdout.flush().map_err(stdout_error)?;
            }
            StreamEvent::End(end) => {
                writeln!(stdout).map_err(stdout_error)?;
                return end;
            }
        }
    }
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("aienvoy={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
