mod bot;
mod config;
mod gemini_client;
mod server;
mod twiml;

use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use eyre::Result;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use crate::bot::Dispatcher;
use crate::bot::conversation_state::InMemorySessionStore;
use crate::bot::user_state::InMemoryModeStore;
use crate::config::Settings;
use crate::gemini_client::GeminiClient;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to bind the webhook server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Refusing to start: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    info!(model = %settings.model, "Starting Gemini webhook bot");

    let model = GeminiClient::new(&settings)?;
    let dispatcher = Dispatcher::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(InMemoryModeStore::new()),
        Arc::new(model),
        settings.personality.clone(),
    );

    server::serve(SocketAddr::new(cli.host, cli.port), Arc::new(dispatcher)).await?;

    Ok(ExitCode::SUCCESS)
}
