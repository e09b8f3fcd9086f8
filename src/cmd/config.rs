//! Configuration view and validation commands — `tuinbeheer config`.

use anyhow::Result;
use console::style;

use super::super::ConfigCommands;
use tuinbeheer::config::{TuinConfig, TuinToml};
use tuinbeheer::ui::icons::{CHECK, WARN};

pub fn cmd_config(config: &TuinConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = &config.config_path;

    match command {
        None | Some(ConfigCommands::Show) => {
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!(
                    "No tuin.toml found at {}; showing defaults",
                    config_path.display()
                );
            }
            println!("{}", style("Effective values (with env overrides):").dim());
            println!();
            println!("{}", toml::to_string_pretty(&config.toml)?);
        }
        Some(ConfigCommands::Validate) => {
            if !config_path.exists() {
                println!("No tuin.toml found. Using defaults.");
            }
            let warnings = config.toml.validate();
            if warnings.is_empty() {
                println!("{}Configuration is valid.", CHECK);
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  {}{}", WARN, warning);
                }
            }
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("tuin.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }
            if let Some(parent) = config_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            TuinToml::default().save(config_path)?;
            println!("{}Created tuin.toml at {}", CHECK, config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] host, port, db_path");
            println!("  - [webhook] secret (or set VERCEL_WEBHOOK_SECRET)");
            println!("  - [build_monitor] command, max_attempts, safety_level");
        }
    }

    Ok(())
}
