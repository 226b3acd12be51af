//! HTTP server command

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pokedex_server::{run_server, InMemoryStore, PokemonStore, ServerConfig};

use crate::config::PokedexConfig;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides POKEDEX_BIND and the config file)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// JSON seed file with the catalog (overrides POKEDEX_SEED and the config file)
    #[arg(long, short = 's', value_name = "PATH")]
    pub seed: Option<PathBuf>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,
}

impl ServeArgs {
    /// Merge flags over the loaded configuration.
    fn server_config(&self, config: &PokedexConfig) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind.unwrap_or(config.server.bind),
            cors_permissive: self.cors_permissive || config.server.cors_permissive,
            page_limits: config.page_limits(),
        }
    }
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs, config: &PokedexConfig) -> Result<()> {
    let server_config = args.server_config(config);

    let store: Arc<dyn PokemonStore> = match args.seed.as_ref().or(config.catalog.seed_path.as_ref()) {
        Some(path) => {
            let store = InMemoryStore::load_seed_file(path)
                .await
                .with_context(|| format!("Failed to load seed file {}", path.display()))?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("No seed file configured, serving an empty catalog");
            Arc::new(InMemoryStore::new())
        }
    };

    tracing::info!("Starting pokedex server on {}", server_config.bind_addr);

    // Run server (blocks until shutdown)
    run_server(store, server_config)
        .await
        .context("Server error")?;

    Ok(())
}
