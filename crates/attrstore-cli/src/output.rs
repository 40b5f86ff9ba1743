//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use attrstore_core::storage::TableDescription;
use attrstore_core::{AttributeValue, Record};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// JSON view of a collection's catalog entry
#[derive(Debug, Serialize)]
struct CollectionSummary<'a> {
    name: &'a str,
    hash_key: &'a str,
    status: &'a str,
    read_capacity: u32,
    write_capacity: u32,
    created_at: String,
}

impl<'a> From<&'a TableDescription> for CollectionSummary<'a> {
    fn from(description: &'a TableDescription) -> Self {
        Self {
            name: &description.name,
            hash_key: &description.key_schema.hash_key,
            status: description.status.as_str(),
            read_capacity: description.read_capacity,
            write_capacity: description.write_capacity,
            created_at: description.created_at.to_rfc3339(),
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single record
    ///
    /// Quiet mode prints only the value of `key_field`.
    pub fn print_record(&self, record: &Record, key_field: &str) {
        match self.format {
            OutputFormat::Human => {
                let width = record.fields().map(|(name, _)| name.len()).max().unwrap_or(0);
                for (name, value) in record.fields() {
                    println!("{:width$}  {}", format!("{}:", name), value, width = width + 1);
                }
            }
            OutputFormat::Json => {
                println!("{}", record.to_json());
            }
            OutputFormat::Quiet => {
                if let Some(key) = record.get(key_field) {
                    println!("{}", key);
                }
            }
        }
    }

    /// Print a lookup that may have found nothing
    pub fn print_optional_record(&self, record: Option<&Record>, key_field: &str) {
        match (record, self.format) {
            (Some(record), _) => self.print_record(record, key_field),
            (None, OutputFormat::Human) => println!("No record found."),
            (None, OutputFormat::Json) => println!("null"),
            (None, OutputFormat::Quiet) => {}
        }
    }

    /// Print a list of records, one line each
    pub fn print_records(&self, records: &[Record], key_field: &str) {
        match self.format {
            OutputFormat::Human => {
                if records.is_empty() {
                    println!("No records found.");
                    return;
                }
                for record in records {
                    let key = record
                        .get(key_field)
                        .map(|key| key.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    let rest: Vec<String> = record
                        .fields()
                        .filter(|(name, _)| name.as_str() != key_field)
                        .map(|(name, value)| format!("{}={}", name, preview(value)))
                        .collect();
                    println!("{} | {}", truncate(&key, 12), truncate(&rest.join(", "), 70));
                }
                println!("\n{} record(s)", records.len());
            }
            OutputFormat::Json => {
                let json: Vec<_> = records.iter().map(Record::to_json).collect();
                println!("{}", serde_json::Value::Array(json));
            }
            OutputFormat::Quiet => {
                for record in records {
                    if let Some(key) = record.get(key_field) {
                        println!("{}", key);
                    }
                }
            }
        }
    }

    /// Print catalog entries of several collections
    pub fn print_collections(&self, collections: &[TableDescription]) {
        match self.format {
            OutputFormat::Human => {
                if collections.is_empty() {
                    println!("No collections found.");
                    return;
                }
                for description in collections {
                    println!(
                        "{} | {} | key: {}",
                        truncate(&description.name, 30),
                        description.status,
                        description.key_schema.hash_key
                    );
                }
                println!("\n{} collection(s)", collections.len());
            }
            OutputFormat::Json => {
                let summaries: Vec<CollectionSummary> =
                    collections.iter().map(CollectionSummary::from).collect();
                println!("{}", serde_json::json!(summaries));
            }
            OutputFormat::Quiet => {
                for description in collections {
                    println!("{}", description.name);
                }
            }
        }
    }

    /// Print one collection's catalog entry
    pub fn print_collection(&self, description: &TableDescription) {
        match self.format {
            OutputFormat::Human => {
                println!("Name:     {}", description.name);
                println!("Key:      {}", description.key_schema.hash_key);
                println!("Status:   {}", description.status);
                println!(
                    "Capacity: {} read / {} write",
                    description.read_capacity, description.write_capacity
                );
                println!(
                    "Created:  {}",
                    description.created_at.format("%Y-%m-%d %H:%M")
                );
            }
            OutputFormat::Json => {
                println!("{}", serde_json::json!(CollectionSummary::from(description)));
            }
            OutputFormat::Quiet => {
                println!("{}", description.status);
            }
        }
    }

    /// Print a bare value (ids and the like)
    pub fn print_value(&self, value: &str) {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::json!({ "value": value })),
            OutputFormat::Human | OutputFormat::Quiet => println!("{}", value),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// One-line rendering of a field value for list output
fn preview(value: &AttributeValue) -> String {
    match value {
        AttributeValue::String(s) => truncate_line(s, 30),
        other => other.to_string(),
    }
}

/// Truncate a string to max length in characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
