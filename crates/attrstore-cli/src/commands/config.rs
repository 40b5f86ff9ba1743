//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use attrstore_core::Config;

use crate::output::{Output, OutputFormat};

const NOT_SET: &str = "(not set)";

/// Show current configuration
///
/// The secret access key is never printed, only whether it is set.
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "primary_key": config.primary_key,
                    "access_key_id": config.access_key_id,
                    "secret_access_key_set": config.secret_access_key.is_some(),
                    "read_capacity": config.read_capacity,
                    "write_capacity": config.write_capacity,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:          {}", config.data_dir.display());
            println!("  primary_key:       {}", config.primary_key);
            println!(
                "  access_key_id:     {}",
                config.access_key_id.as_deref().unwrap_or(NOT_SET)
            );
            println!(
                "  secret_access_key: {}",
                if config.secret_access_key.is_some() {
                    "********"
                } else {
                    NOT_SET
                }
            );
            println!("  read_capacity:     {}", config.read_capacity);
            println!("  write_capacity:    {}", config.write_capacity);
            println!(
                "  log_file:          {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| NOT_SET.to_string())
            );
            println!();
            println!("Database:    {}", config.database_path().display());
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    let shown = if key == "secret_access_key" {
        "********"
    } else {
        value.as_str()
    };
    output.success(&format!("Set {} = {}", key, shown));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "primary_key" => {
            if value.is_empty() {
                bail!("primary_key cannot be empty");
            }
            config.primary_key = value.to_string();
        }
        "access_key_id" => {
            config.access_key_id = optional(value);
        }
        "secret_access_key" => {
            config.secret_access_key = optional(value);
        }
        "read_capacity" => {
            config.read_capacity = value
                .parse()
                .context("Invalid value for read_capacity. Use a positive integer.")?;
        }
        "write_capacity" => {
            config.write_capacity = value
                .parse()
                .context("Invalid value for write_capacity. Use a positive integer.")?;
        }
        "log_file" => {
            config.log_file = optional(value).map(PathBuf::from);
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, primary_key, access_key_id, secret_access_key, \
                 read_capacity, write_capacity, log_file",
                key
            );
        }
    }
    Ok(())
}

/// Empty or "none" clears an optional value
fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}
