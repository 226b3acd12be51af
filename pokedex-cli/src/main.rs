//! pokedex CLI
//!
//! Entry point for the catalog HTTP server plus small tools:
//! - `serve`: run the HTTP API
//! - `cursor`: encode/decode pagination cursors
//! - `config`: inspect the effective configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod tracing_setup;

use config::PokedexConfig;
use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "pokedex",
    author,
    version,
    about = "Pokemon catalog API with cursor pagination and request-scoped batch loading"
)]
struct Cli {
    /// Enable debug logging (RUST_LOG still wins)
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.pokedex/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Encode or decode pagination cursors
    Cursor(commands::cursor::CursorArgs),
    /// Show configuration (path, show)
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_files = config::load_dotenv();
    let settings = PokedexConfig::load(cli.config.as_deref())?;

    tracing_setup::init_tracing(&TracingConfig {
        debug: cli.debug,
        level: settings.log.level.clone(),
    })?;
    for path in &env_files {
        tracing::debug!("Loaded .env from {}", path.display());
    }

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args, &settings).await?,
        Commands::Cursor(args) => commands::run_cursor(args)?,
        Commands::Config(args) => config::run_config(args, cli.config.as_deref(), &settings)?,
    }

    Ok(())
}
