//! Configuration for the pokedex binary
//!
//! Sources, highest priority first:
//! 1. Command-line flags
//! 2. Environment (`POKEDEX_BIND`, `POKEDEX_SEED`), including `.env` files
//! 3. `~/.pokedex/config.toml`, or the file named by `--config`
//! 4. Built-in defaults

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pokedex_server::state::{PageLimits, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const BIND_ENV: &str = "POKEDEX_BIND";
pub const SEED_ENV: &str = "POKEDEX_SEED";

/// Get the pokedex config directory path (~/.pokedex)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pokedex"))
}

/// Load `.env` from the current directory, then `~/.pokedex/.env`.
///
/// dotenvy never overwrites variables that are already set, so the current
/// directory wins over the home directory and the real environment wins
/// over both.
pub fn load_dotenv() -> Vec<PathBuf> {
    let mut loaded = Vec::new();

    if let Ok(path) = dotenvy::dotenv() {
        loaded.push(path);
    }

    if let Some(env_file) = config_dir().map(|dir| dir.join(".env")) {
        if env_file.exists() && dotenvy::from_path(&env_file).is_ok() {
            loaded.push(env_file);
        }
    }

    loaded
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PokedexConfig {
    pub server: ServerSection,
    pub catalog: CatalogSection,
    pub pagination: PaginationSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: SocketAddr,
    pub cors_permissive: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 4000)),
            cors_permissive: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    /// JSON seed file loaded at startup
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationSection {
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl Default for PaginationSection {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// EnvFilter directive, e.g. "info" or "pokedex_core=debug"
    pub level: Option<String>,
}

impl PokedexConfig {
    /// Default config file location (~/.pokedex/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Load the config file and apply environment overrides.
    ///
    /// An explicit path must exist. The default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Override file values with environment variables found by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bind) = lookup(BIND_ENV).filter(|v| !v.trim().is_empty()) {
            self.server.bind = bind
                .trim()
                .parse()
                .with_context(|| format!("{} is not a socket address: {}", BIND_ENV, bind))?;
        }
        if let Some(seed) = lookup(SEED_ENV).filter(|v| !v.trim().is_empty()) {
            self.catalog.seed_path = Some(PathBuf::from(seed));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let PaginationSection {
            default_page_size,
            max_page_size,
        } = self.pagination;
        if default_page_size < 1 || max_page_size < 1 {
            bail!("pagination sizes must be positive");
        }
        if default_page_size > max_page_size {
            bail!(
                "pagination.default_page_size ({}) exceeds pagination.max_page_size ({})",
                default_page_size,
                max_page_size
            );
        }
        Ok(())
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_page_size: self.pagination.default_page_size,
            max_page_size: self.pagination.max_page_size,
        }
    }
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show config file path
    Path,
    /// Print the effective configuration as TOML
    Show,
}

pub fn run_config(args: ConfigArgs, explicit: Option<&Path>, config: &PokedexConfig) -> Result<()> {
    match args.command {
        ConfigCommands::Path => {
            let path = explicit
                .map(Path::to_path_buf)
                .or_else(PokedexConfig::default_path)
                .context("Could not determine home directory")?;
            println!("{}", path.display());
        }
        ConfigCommands::Show => {
            let rendered =
                toml::to_string_pretty(config).context("Failed to serialize config")?;
            print!("{}", rendered);
        }
    }
    Ok(())
}
