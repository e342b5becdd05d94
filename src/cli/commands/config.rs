use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;

use crate::cli::AppContext;
use crate::config::Config;
use crate::core::ErgonError;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show all configuration values
    Show,

    /// Get a specific configuration value
    Get {
        /// Config key (e.g., defaultImageEngine, googleApiKey)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Config key (e.g., defaultImageEngine, googleApiKey)
        key: String,
        /// Value to set
        value: String,
    },

    /// Remove a value so the default applies again
    Unset {
        /// Config key
        key: String,
    },

    /// Show the config file path
    Path,
}

pub fn run(args: ConfigArgs, ctx: &mut AppContext) -> Result<()> {
    match args.command {
        Some(ConfigCommand::Show) | None => show_config(ctx),
        Some(ConfigCommand::Get { key }) => get_config(&key, ctx),
        Some(ConfigCommand::Set { key, value }) => set_config(&key, &value, ctx),
        Some(ConfigCommand::Unset { key }) => unset_config(&key, ctx),
        Some(ConfigCommand::Path) => show_path(ctx),
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigRow {
    pub key: &'static str,
    pub value: Option<String>,
    pub default: Option<&'static str>,
}

/// Every known key with its (masked) value and the default that applies when unset
pub fn config_rows(config: &Config) -> Vec<ConfigRow> {
    Config::keys()
        .iter()
        .map(|&key| ConfigRow {
            key,
            value: config.get(key),
            default: Config::default_for(key),
        })
        .collect()
}

fn show_config(ctx: &AppContext) -> Result<()> {
    let rows = config_rows(&ctx.config);
    ctx.emit("config show", &rows, || {
        println!("{}", "Configuration".cyan().bold());
        println!("{}", "=".repeat(50));
        println!();
        for row in &rows {
            let value = match (&row.value, row.default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => format!("{} {}", default, "(default)".dimmed()),
                (None, None) => "(not set)".dimmed().to_string(),
            };
            println!("  {} = {}", row.key.bold(), value);
        }
        println!();
        println!("{}", format!("Config file: {}", ctx.config.config_path.display()).dimmed());
    });
    Ok(())
}

fn get_config(key: &str, ctx: &AppContext) -> Result<()> {
    if !Config::keys().iter().any(|k| *k == key) {
        return Err(ErgonError::invalid("config key", key, Config::keys().join(", ")).into());
    }

    let value = ctx.config.get(key);
    let default = Config::default_for(key);
    let result = json!({ "key": key, "value": value, "default": default });
    ctx.emit("config get", &result, || match (&value, default) {
        (Some(value), _) => println!("{}", value),
        (None, Some(default)) => println!("{} {}", default, "(default)".dimmed()),
        (None, None) => println!("{}", "(not set)".dimmed()),
    });
    Ok(())
}

fn set_config(key: &str, value: &str, ctx: &mut AppContext) -> Result<()> {
    ctx.config.set(key, value)?;
    ctx.config.save()?;

    let shown = ctx.config.get(key).unwrap_or_default();
    ctx.logger("config").info("Config value set", Some(json!({ "key": key, "value": shown })));
    ctx.emit("config set", &json!({ "key": key, "value": shown }), || {
        println!("{} Set {} = {}", "✓".green(), key.cyan(), shown);
    });
    Ok(())
}

fn unset_config(key: &str, ctx: &mut AppContext) -> Result<()> {
    let removed = ctx.config.unset(key)?;
    if removed {
        ctx.config.save()?;
        ctx.logger("config").info("Config value removed", Some(json!({ "key": key })));
    }

    ctx.emit("config unset", &json!({ "key": key, "removed": removed }), || {
        if removed {
            println!("{} Unset {}", "✓".green(), key.cyan());
        } else {
            println!("{} was not set", key.cyan());
        }
    });
    Ok(())
}

fn show_path(ctx: &AppContext) -> Result<()> {
    let path = ctx.config.config_path.display().to_string();
    ctx.emit("config path", &json!({ "path": path }), || println!("{}", path));
    Ok(())
}
