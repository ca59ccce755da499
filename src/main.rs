use anyhow::Result;
use clap::{Parser, Subcommand};
use seekr::commands::{self, ChatOptions};
use seekr::server::{self, AppState};
use seekr::{ChatBackend, Config, DeepSeekClient, ModelKind, Translator};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "seekr")]
#[command(version)]
#[command(about = "Chat with DeepSeek models and serve a translation API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat that streams the reasoning and the answer
    Chat {
        /// Model to talk to (chat or reasoner)
        #[arg(long, default_value_t = ModelKind::Reasoner)]
        model: ModelKind,

        /// System prompt placed before the conversation
        #[arg(long)]
        system: Option<String>,

        /// Wait for the whole answer instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },
    /// Serve the translation HTTP API
    Serve {
        #[arg(long, env = "SEEKR_HTTP_ADDR", default_value = "127.0.0.1:5000")]
        addr: String,
    },
    /// Verify the API key and connectivity
    Check {
        #[arg(long, default_value_t = ModelKind::Chat)]
        model: ModelKind,
    },
}

fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_backend() -> Result<Arc<dyn ChatBackend>> {
    let config = Config::load()?;
    tracing::debug!(?config, "configuration loaded");
    let client: Arc<dyn ChatBackend> = Arc::new(DeepSeekClient::new(&config)?);
    Ok(client)
}

async fn run(command: Commands) -> Result<bool> {
    match command {
        Commands::Chat { model, system, no_stream } => {
            let backend = build_backend()?;
            let options = ChatOptions {
                model,
                system_prompt: system,
                streaming: !no_stream,
            };
            commands::run_chat(backend, options).await?;
            Ok(true)
        }
        Commands::Serve { addr } => {
            let backend = build_backend()?;
            println!("Starting DeepSeek translation API server...");
            server::serve(AppState::new(Translator::new(backend)), &addr).await?;
            Ok(true)
        }
        Commands::Check { model } => {
            let backend = build_backend()?;
            commands::check_connection(backend.as_ref(), model, &mut std::io::stdout()).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // bare `seekr` = chat with the reasoner
    let command = cli.command.unwrap_or(Commands::Chat {
        model: ModelKind::Reasoner,
        system: None,
        no_stream: false,
    });

    let default_directive = match command {
        Commands::Serve { .. } => "seekr=info,tower_http=info",
        _ => "seekr=warn",
    };
    init_tracing(default_directive);

    match run(command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            eprintln!("❌ {e:#}");
            std::process::exit(1);
        }
    }
}
