//! Bulk data command handlers

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};

use attrstore_core::{Document, Interface, Persistence, TableService};

use crate::output::Output;
use crate::prompt::confirm;

/// Clear every collection, then load the records in `path`
///
/// The file holds one JSON object mapping collection names to arrays of
/// records.
pub fn seed<S: TableService>(
    interface: &Interface<S>,
    path: &Path,
    yes: bool,
    output: &Output,
) -> Result<()> {
    let data = read_seed_file(path)?;

    if !confirmed(yes, output, "Delete every record before seeding?")? {
        output.message("Cancelled.");
        return Ok(());
    }

    interface
        .set_data(&data)
        .with_context(|| format!("Failed to seed from {:?}", path))?;

    let total: usize = data.values().map(Vec::len).sum();
    output.success(&format!(
        "Seeded {} record(s) into {} collection(s)",
        total,
        data.len()
    ));
    Ok(())
}

/// Delete every record of every collection
pub fn clear<S: TableService>(interface: &Interface<S>, yes: bool, output: &Output) -> Result<()> {
    if !confirmed(yes, output, "Delete every record of every collection?")? {
        output.message("Cancelled.");
        return Ok(());
    }

    interface.clear().context("Failed to clear collections")?;
    output.success("Cleared all collections");
    Ok(())
}

/// Print a short id derived from the clock and a salt
pub fn generate_id<S: TableService>(
    interface: &Interface<S>,
    salt: &str,
    output: &Output,
) -> Result<()> {
    output.print_value(&interface.generate_unique_id(salt));
    Ok(())
}

/// Destructive commands need `--yes` outside interactive human output
fn confirmed(yes: bool, output: &Output, prompt: &str) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !output.should_prompt() {
        bail!("Refusing to delete records without confirmation. Pass --yes.");
    }
    confirm(prompt)
}

fn read_seed_file(path: &Path) -> Result<BTreeMap<String, Vec<Document>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Seed file must map collection names to arrays of objects: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use tempfile::TempDir;

    #[test]
    fn test_confirmation_required_when_not_interactive() {
        let json = Output::new(OutputFormat::Json);
        assert!(confirmed(true, &json, "Sure?").unwrap());
        assert!(confirmed(false, &json, "Sure?").is_err());

        let quiet = Output::new(OutputFormat::Quiet);
        assert!(confirmed(false, &quiet, "Sure?").is_err());
    }

    #[test]
    fn test_read_seed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("seed.json");
        std::fs::write(
            &path,
            r#"{"fruits": [{"id": "1", "name": "Apple"}], "posts": []}"#,
        )
        .unwrap();

        let data = read_seed_file(&path).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data["fruits"].len(), 1);
        assert!(data["posts"].is_empty());
    }

    #[test]
    fn test_read_seed_file_rejects_wrong_shape() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("seed.json");
        std::fs::write(&path, r#"{"fruits": {"id": "1"}}"#).unwrap();
        assert!(read_seed_file(&path).is_err());

        assert!(read_seed_file(&temp_dir.path().join("missing.json")).is_err());
    }
}
