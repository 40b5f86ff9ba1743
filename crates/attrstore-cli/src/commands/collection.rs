//! Collection command handlers

use anyhow::{Context, Result};

use attrstore_core::{Interface, Persistence, TableService};

use crate::output::Output;

/// List every collection with its status
pub fn list<S: TableService>(interface: &Interface<S>, output: &Output) -> Result<()> {
    let store = interface.store();
    let descriptions = store
        .collections()?
        .iter()
        .map(|name| store.describe_collection(name))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to describe collections")?;

    output.print_collections(&descriptions);
    Ok(())
}

/// Create a collection keyed by the identifying field
pub fn create<S: TableService>(
    interface: &Interface<S>,
    name: &str,
    read_capacity: u32,
    write_capacity: u32,
    output: &Output,
) -> Result<()> {
    let description = interface
        .create_collection_with_capacity(name, read_capacity, write_capacity)
        .with_context(|| format!("Failed to create collection '{}'", name))?;

    output.success(&format!(
        "Created collection {} (key: {})",
        description.name, description.key_schema.hash_key
    ));
    output.print_collection(&description);
    Ok(())
}

/// Show one collection
pub fn status<S: TableService>(interface: &Interface<S>, name: &str, output: &Output) -> Result<()> {
    let description = interface.store().describe_collection(name)?;
    output.print_collection(&description);
    Ok(())
}
