//! `devsite config`: show, validate and initialise devsite.toml.

use anyhow::{Context, Result};
use std::path::Path;

use super::super::ConfigCommands;

const MASK: &str = "********";

pub fn cmd_config(config_path: &Path, command: Option<ConfigCommands>) -> Result<()> {
    use devsite::config::DeployToml;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("devsite Configuration");
            println!("=====================");
            println!();

            let mut toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                DeployToml::load(config_path)?
            } else {
                println!("No devsite.toml found at {}", config_path.display());
                println!("Using default configuration.");
                DeployToml::default()
            };
            println!();

            toml.apply_env_overrides(|key| std::env::var(key).ok());
            for secret in [
                &mut toml.stack.mysql_password,
                &mut toml.stack.mysql_root_password,
            ] {
                if !secret.is_empty() {
                    *secret = MASK.to_string();
                }
            }
            let rendered =
                ::toml::to_string_pretty(&toml).context("Failed to render configuration")?;
            println!("Effective values (with env overrides):");
            println!();
            println!("{}", rendered);
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No devsite.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = DeployToml::load(config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("devsite.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }

            DeployToml::default().save(config_path)?;

            println!("Created devsite.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [paths] profiles_root, sites_root, db_backup_cache");
            println!("  - [stack] MySQL and Elasticsearch connection settings");
            println!("  - [site_codes] local directory names for your projects");
            println!();
        }
    }

    Ok(())
}
