//! Record command handlers

use anyhow::{Context, Result};

use attrstore_core::{Interface, Persistence, TableService};

use super::{parse_document, parse_value};
use crate::output::Output;

/// Add a record
pub fn add<S: TableService>(
    interface: &Interface<S>,
    collection: &str,
    raw: &str,
    output: &Output,
) -> Result<()> {
    let document = parse_document(raw)?;
    let record = interface
        .add(collection, &document)
        .with_context(|| format!("Failed to add record to '{}'", collection))?;

    output.success(&format!("Added record to {}", collection));
    output.print_record(&record, interface.primary_key_identifier());
    Ok(())
}

/// Replace the record with the same identifying value
pub fn replace<S: TableService>(
    interface: &Interface<S>,
    collection: &str,
    raw: &str,
    output: &Output,
) -> Result<()> {
    let document = parse_document(raw)?;
    let record = interface
        .replace(collection, &document)
        .with_context(|| format!("Failed to replace record in '{}'", collection))?;

    output.success(&format!("Replaced record in {}", collection));
    output.print_record(&record, interface.primary_key_identifier());
    Ok(())
}

/// Find the first (or every) record whose field equals a value
pub fn find<S: TableService>(
    interface: &Interface<S>,
    collection: &str,
    key: &str,
    raw_value: &str,
    all: bool,
    typed: bool,
    output: &Output,
) -> Result<()> {
    let value = parse_value(raw_value, typed)?;
    let key_field = interface.primary_key_identifier();

    if all {
        let records = interface.get_all_for_key_with_value(collection, key, &value)?;
        output.print_records(&records, key_field);
    } else {
        let record = interface.find(collection, key, &value)?;
        output.print_optional_record(record.as_ref(), key_field);
    }
    Ok(())
}

/// List every record of a collection
pub fn find_all<S: TableService>(
    interface: &Interface<S>,
    collection: &str,
    output: &Output,
) -> Result<()> {
    let records = interface.find_all(collection)?;
    output.print_records(&records, interface.primary_key_identifier());
    Ok(())
}

/// Records matching every field of a JSON object
pub fn find_where<S: TableService>(
    interface: &Interface<S>,
    collection: &str,
    raw_params: &str,
    output: &Output,
) -> Result<()> {
    let params = parse_document(raw_params)?;
    let records = interface.get_by_params(collection, &params)?;
    output.print_records(&records, interface.primary_key_identifier());
    Ok(())
}

/// Records whose field holds any of the values
pub fn containing_any<S: TableService>(
    interface: &Interface<S>,
    collection: &str,
    key: &str,
    raw_values: &[String],
    typed: bool,
    output: &Output,
) -> Result<()> {
    let values = raw_values
        .iter()
        .map(|raw| parse_value(raw, typed))
        .collect::<Result<Vec<_>>>()?;
    let records = interface.containing_any(collection, key, &values)?;
    output.print_records(&records, interface.primary_key_identifier());
    Ok(())
}

/// Records whose set field holds a value
pub fn contains<S: TableService>(
    interface: &Interface<S>,
    collection: &str,
    key: &str,
    raw_value: &str,
    typed: bool,
    output: &Output,
) -> Result<()> {
    let value = parse_value(raw_value, typed)?;
    let records = interface.array_contains(collection, key, &value)?;
    output.print_records(&records, interface.primary_key_identifier());
    Ok(())
}

/// Add a value to a record's set field
pub fn push<S: TableService>(
    interface: &Interface<S>,
    collection: &str,
    id: &str,
    field: &str,
    raw_value: &str,
    typed: bool,
    output: &Output,
) -> Result<()> {
    let value = parse_value(raw_value, typed)?;
    let id_value = parse_value(id, false)?;
    interface
        .push_to_array(
            collection,
            interface.primary_key_identifier(),
            &id_value,
            field,
            &value,
        )
        .with_context(|| format!("Failed to push onto {}.{}", collection, field))?;

    output.success(&format!("Pushed {} onto {} of {}", raw_value, field, id));
    Ok(())
}

/// Remove a value from a record's set field
pub fn pull<S: TableService>(
    interface: &Interface<S>,
    collection: &str,
    id: &str,
    field: &str,
    raw_value: &str,
    typed: bool,
    output: &Output,
) -> Result<()> {
    let value = parse_value(raw_value, typed)?;
    let id_value = parse_value(id, false)?;
    interface
        .remove_from_array(
            collection,
            interface.primary_key_identifier(),
            &id_value,
            field,
            &value,
        )
        .with_context(|| format!("Failed to remove from {}.{}", collection, field))?;

    output.success(&format!("Removed {} from {} of {}", raw_value, field, id));
    Ok(())
}

/// Set one field of a record
pub fn set<S: TableService>(
    interface: &Interface<S>,
    collection: &str,
    id: &str,
    field: &str,
    raw_value: &str,
    typed: bool,
    output: &Output,
) -> Result<()> {
    let value = parse_value(raw_value, typed)?;
    let id_value = parse_value(id, false)?;
    interface
        .update_field_with_value(collection, &id_value, field, &value)
        .with_context(|| format!("Failed to update {}.{}", collection, field))?;

    output.success(&format!("Set {} = {} on {}", field, raw_value, id));
    Ok(())
}

/// Delete the first record matching a JSON object
pub fn delete<S: TableService>(
    interface: &Interface<S>,
    collection: &str,
    raw_params: &str,
    output: &Output,
) -> Result<()> {
    let params = parse_document(raw_params)?;
    interface
        .delete_by_params(collection, &params)
        .with_context(|| format!("Failed to delete from '{}'", collection))?;

    output.success(&format!("Deleted first match from {}", collection));
    Ok(())
}
