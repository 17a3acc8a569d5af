use anyhow::Result;
use clap::{Parser, Subcommand};
use mailsage::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailsage", about = "AI marketing-feedback-by-email service")]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = "mailsage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook gateway (default)
    Serve,
    /// Check config, persona store, and external credentials
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => mailsage::gateway::serve(config).await,
        Command::Doctor => mailsage::doctor::run(&config).await,
    }
}
