use crate::agent::{ChatEngine, TurnOptions};
use crate::config::Config;
use crate::gateway::{AppState, serve};
use crate::lookup::{CatalogClient, VectorSearchClient};
use crate::providers::GeminiProvider;
use crate::session::SessionManager;
use crate::tools::ToolRegistry;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "partbot", version, about = "Grounded appliance-parts assistant")]
struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API server
    Serve {
        /// Override the configured bind port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ask a single question and print the validated answer
    Ask {
        /// The question to ask
        question: String,
        /// Skip the validation layer
        #[arg(long)]
        no_validate: bool,
    },
}

/// Construct the engine from config: all backend handles are built here, at
/// process startup, and injected into the engine.
fn build_engine(config: &Config) -> ChatEngine {
    let provider = Arc::new(GeminiProvider::new(
        config.provider.api_key.clone(),
        Some(config.provider.model.clone()),
    ));
    let registry = ToolRegistry::new(
        Arc::new(CatalogClient::new(config.lookup.catalog_url.clone())),
        Arc::new(VectorSearchClient::new(config.lookup.vector_url.clone())),
    );
    ChatEngine::new(provider, registry)
        .with_generation(config.provider.temperature, config.provider.max_tokens)
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { port } => {
            let state = AppState {
                engine: Arc::new(build_engine(&config)),
                sessions: Arc::new(SessionManager::new(config.server.session_timeout_minutes)),
            };
            let port = port.unwrap_or(config.server.port);
            serve(state, &config.server.host, port).await
        }
        Command::Ask {
            question,
            no_validate,
        } => {
            let engine = build_engine(&config);
            let opts = TurnOptions {
                enable_validation: config.validation.enabled && !no_validate,
                validation_threshold: config.validation.threshold,
                max_retries: config.validation.max_retries,
            };
            let result = engine.handle_turn(&question, &[], &opts).await;

            println!("{}", result.response);
            if let Some(verdict) = &result.verdict {
                eprintln!(
                    "[score {}/100, {} tool call(s), {} attempt(s)]",
                    verdict.score,
                    result.tool_calls.len(),
                    result.attempt_scores.len().max(1)
                );
            }
            Ok(())
        }
    }
}
