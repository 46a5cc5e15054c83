//! Configuration resolution for the CLI.
//!
//! Configuration is loaded with precedence:
//! 1. Command-line flags (`--database`, `--offline`)
//! 2. Environment variables (`MNEMO_DATABASE_PATH`)
//! 3. Config file (`--config`, `MNEMO_CONFIG`, or `<data dir>/mnemo/config.toml`)
//! 4. Default values

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mnemo_sdk::{LlmProvider, MnemoConfig};

use crate::cli::Cli;

/// Path of the config file this invocation uses.
pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(MnemoConfig::config_path)
}

/// Load the file at `path` if present, otherwise defaults.
pub fn load_file(path: &Path) -> Result<MnemoConfig> {
    if path.exists() {
        MnemoConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))
    } else {
        Ok(MnemoConfig::default())
    }
}

/// Apply flag and environment overrides.
pub fn apply_overrides(
    mut config: MnemoConfig,
    cli: &Cli,
    env_database: Option<String>,
) -> Result<MnemoConfig> {
    if let Some(db) = env_database {
        config.database_path = PathBuf::from(db);
    }
    if let Some(db) = &cli.database {
        config.database_path = db.clone();
    }
    if cli.offline {
        config.llm.provider = LlmProvider::Extractive;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Effective configuration for this invocation.
pub fn load(cli: &Cli) -> Result<MnemoConfig> {
    let config = load_file(&config_path(cli))?;
    apply_overrides(config, cli, std::env::var("MNEMO_DATABASE_PATH").ok())
}
