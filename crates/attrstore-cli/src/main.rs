//! attrstore CLI
//!
//! Admin shell for attrstore - inspect, seed and edit collections.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use attrstore_core::{Config, Connection, Interface};

mod commands;
mod output;
mod prompt;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "attrstore")]
#[command(about = "attrstore - Generic record storage over a key-attribute table service")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file to use instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List collections
    #[command(alias = "ls")]
    Collections,
    /// Create a collection keyed by the configured identifying field
    CreateCollection {
        /// Collection name
        name: String,
        /// Read capacity (defaults to config)
        #[arg(long)]
        read: Option<u32>,
        /// Write capacity (defaults to config)
        #[arg(long)]
        write: Option<u32>,
    },
    /// Show a collection's status
    Status {
        /// Collection name
        name: String,
    },
    /// Add a record (JSON object)
    Add {
        collection: String,
        /// Record as a JSON object
        record: String,
    },
    /// Replace the record with the same identifying field
    Replace {
        collection: String,
        /// Record as a JSON object
        record: String,
    },
    /// Find the first record whose field equals a value
    Find {
        collection: String,
        key: String,
        value: String,
        /// Return every match instead of the first
        #[arg(short, long)]
        all: bool,
        /// Parse the value as JSON (numbers, booleans)
        #[arg(short, long)]
        typed: bool,
    },
    /// List every record of a collection
    FindAll { collection: String },
    /// Records matching every field of a JSON object
    Where {
        collection: String,
        /// Conditions as a JSON object
        params: String,
    },
    /// Records whose set field holds any of the values
    Any {
        collection: String,
        key: String,
        values: Vec<String>,
        /// Parse the values as JSON (numbers, booleans)
        #[arg(short, long)]
        typed: bool,
    },
    /// Records whose set field holds a value
    Contains {
        collection: String,
        key: String,
        value: String,
        /// Parse the value as JSON (numbers, booleans)
        #[arg(short, long)]
        typed: bool,
    },
    /// Add a value to a record's set field
    Push {
        collection: String,
        /// Identifying field value of the record
        id: String,
        field: String,
        value: String,
        /// Parse the value as JSON (numbers, booleans)
        #[arg(short, long)]
        typed: bool,
    },
    /// Remove a value from a record's set field
    Pull {
        collection: String,
        /// Identifying field value of the record
        id: String,
        field: String,
        value: String,
        /// Parse the value as JSON (numbers, booleans)
        #[arg(short, long)]
        typed: bool,
    },
    /// Set one field of a record
    Set {
        collection: String,
        /// Identifying field value of the record
        id: String,
        field: String,
        value: String,
        /// Parse the value as JSON (numbers, booleans)
        #[arg(short, long)]
        typed: bool,
    },
    /// Delete the first record matching a JSON object
    #[command(alias = "rm")]
    Delete {
        collection: String,
        /// Conditions as a JSON object
        params: String,
    },
    /// Clear every collection, then load records from a JSON file
    Seed {
        /// File holding {"collection": [record, ...], ...}
        file: PathBuf,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete every record of every collection
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Generate a short record id
    GenerateId {
        /// Salt mixed into the id
        salt: String,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, primary_key, access_key_id, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands don't need the backend
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    let conn = Connection::new(config);
    let interface = Interface::from_connection(&conn);
    debug!("Using table service at {:?}", conn.config().database_path());

    match cli.command {
        Commands::Collections => commands::collection::list(&interface, &output),
        Commands::CreateCollection { name, read, write } => {
            let config = conn.config();
            commands::collection::create(
                &interface,
                &name,
                read.unwrap_or(config.read_capacity),
                write.unwrap_or(config.write_capacity),
                &output,
            )
        }
        Commands::Status { name } => commands::collection::status(&interface, &name, &output),
        Commands::Add { collection, record } => {
            commands::record::add(&interface, &collection, &record, &output)
        }
        Commands::Replace { collection, record } => {
            commands::record::replace(&interface, &collection, &record, &output)
        }
        Commands::Find {
            collection,
            key,
            value,
            all,
            typed,
        } => commands::record::find(&interface, &collection, &key, &value, all, typed, &output),
        Commands::FindAll { collection } => {
            commands::record::find_all(&interface, &collection, &output)
        }
        Commands::Where { collection, params } => {
            commands::record::find_where(&interface, &collection, &params, &output)
        }
        Commands::Any {
            collection,
            key,
            values,
            typed,
        } => commands::record::containing_any(&interface, &collection, &key, &values, typed, &output),
        Commands::Contains {
            collection,
            key,
            value,
            typed,
        } => commands::record::contains(&interface, &collection, &key, &value, typed, &output),
        Commands::Push {
            collection,
            id,
            field,
            value,
            typed,
        } => commands::record::push(&interface, &collection, &id, &field, &value, typed, &output),
        Commands::Pull {
            collection,
            id,
            field,
            value,
            typed,
        } => commands::record::pull(&interface, &collection, &id, &field, &value, typed, &output),
        Commands::Set {
            collection,
            id,
            field,
            value,
            typed,
        } => commands::record::set(&interface, &collection, &id, &field, &value, typed, &output),
        Commands::Delete { collection, params } => {
            commands::record::delete(&interface, &collection, &params, &output)
        }
        Commands::Seed { file, yes } => commands::data::seed(&interface, &file, yes, &output),
        Commands::Clear { yes } => commands::data::clear(&interface, yes, &output),
        Commands::GenerateId { salt } => commands::data::generate_id(&interface, &salt, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// `RUST_LOG` wins when set. Otherwise warnings only, raised by `-v`.
/// Logs go to `config.log_file` when set, stderr otherwise.
fn init_logging(config: &Config, verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("attrstore_core={},attrstore_cli={}", level, level))
    });

    let Some(log_path) = config.log_file.as_ref() else {
        // Ignore error if already initialized
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    };

    let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            return;
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .try_init();
}
