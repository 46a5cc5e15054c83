//! Config commands.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use mnemo_sdk::MnemoConfig;

use crate::cli::{Cli, ConfigAction, ConfigCommand};
use crate::config;

/// Execute config command.
pub fn execute(cmd: &ConfigCommand, cli: &Cli) -> Result<()> {
    let path = config::config_path(cli);
    match cmd.action {
        ConfigAction::Show => {
            let effective = config::load(cli)?;
            print!("{}", effective.to_toml_string()?);
            Ok(())
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "Config file already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            MnemoConfig::default()
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} Wrote default config to {}", "✓".green(), path.display().to_string().cyan());
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}
