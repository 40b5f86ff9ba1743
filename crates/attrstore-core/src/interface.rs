//! Persistence interface
//!
//! [`Persistence`] is the contract application code depends on: store a
//! record, find records, mutate a set field, clear everything. [`Interface`]
//! implements it on top of a [`DataStore`] and the sanitizer.
//!
//! Values coming in (records, query values, set elements) are sanitized
//! before they reach the service, so a query for `true` finds a record
//! stored with `true`.
//!
//! ## Read-then-mutate
//!
//! `push_to_array`, `remove_from_array`, `update_field_with_value` and
//! `delete_by_params` first scan for the target record, then issue the
//! mutation against its key as a separate call. Nothing holds the record in
//! between. A concurrent writer can change or delete it in that window, and
//! the mutation then lands on whatever carries that key at the time, or
//! creates a stub record if nothing does.
//!
//! ## Example
//!
//! ```ignore
//! let conn = Connection::new(Config::load()?);
//! let interface = Interface::from_connection(&conn);
//!
//! interface.add("fruits", &json!({"id": "1", "name": "Apple"}).as_object().unwrap())?;
//! let apple = interface.find("fruits", "id", &json!("1"))?;
//! ```

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_READ_CAPACITY, DEFAULT_WRITE_CAPACITY};
use crate::connection::Connection;
use crate::error::{StoreError, StoreResult};
use crate::models::{Document, Record};
use crate::sanitizer::{sanitize_field, sanitize_record};
use crate::storage::{ScanFilter, TableDescription, TableService, TableStatus};
use crate::store::{self, to_record, to_records, DataStore};

/// Generic persistence contract over named collections of records
///
/// Lookups that find nothing return `None` or an empty list. Mutations that
/// address a record by query act on the first match in the backend's scan
/// order and do nothing when there is no match.
pub trait Persistence {
    /// Store a new record, dropping fields whose value is null
    fn add(&self, collection: &str, record: &Document) -> StoreResult<Record>;

    /// Overwrite the record with the same identifying field value
    ///
    /// Old fields not present in `record` are gone afterwards.
    fn replace(&self, collection: &str, record: &Document) -> StoreResult<Record>;

    /// First record whose `key` field equals `value`
    fn find(&self, collection: &str, key: &str, value: &Value) -> StoreResult<Option<Record>>;

    /// Same as [`Persistence::find`]
    fn get_for_key_with_value(
        &self,
        collection: &str,
        key: &str,
        value: &Value,
    ) -> StoreResult<Option<Record>> {
        self.find(collection, key, value)
    }

    /// Every record whose `key` field equals `value`
    fn get_all_for_key_with_value(
        &self,
        collection: &str,
        key: &str,
        value: &Value,
    ) -> StoreResult<Vec<Record>>;

    /// Records matching every field of `params`; all records when empty
    fn get_by_params(&self, collection: &str, params: &Document) -> StoreResult<Vec<Record>>;

    /// Every record of a collection
    fn find_all(&self, collection: &str) -> StoreResult<Vec<Record>>;

    /// Records whose `key` field holds any of `values`
    fn containing_any(
        &self,
        collection: &str,
        key: &str,
        values: &[Value],
    ) -> StoreResult<Vec<Record>>;

    /// Records whose set field `key` holds `value`
    fn array_contains(&self, collection: &str, key: &str, value: &Value)
        -> StoreResult<Vec<Record>>;

    /// Add `value` to the set field of the first record matching `id_key`
    fn push_to_array(
        &self,
        collection: &str,
        id_key: &str,
        id_value: &Value,
        array_key: &str,
        value: &Value,
    ) -> StoreResult<()>;

    /// Remove `value` from the set field of the first record matching `id_key`
    fn remove_from_array(
        &self,
        collection: &str,
        id_key: &str,
        id_value: &Value,
        array_key: &str,
        value: &Value,
    ) -> StoreResult<()>;

    /// Set one field on the record with the given identifying value
    fn update_field_with_value(
        &self,
        collection: &str,
        id_value: &Value,
        field: &str,
        value: &Value,
    ) -> StoreResult<()>;

    /// Not supported
    fn delete_field(&self, collection: &str, id_value: &Value, field: &str) -> StoreResult<()> {
        let _ = (collection, id_value, field);
        warn!("delete_field is not implemented");
        Err(StoreError::not_implemented("delete_field"))
    }

    /// Not supported
    fn delete_collection(&self, collection: &str) -> StoreResult<()> {
        let _ = collection;
        warn!("delete_collection is not implemented");
        Err(StoreError::not_implemented("delete_collection"))
    }

    /// Not supported
    fn increment_field_by_amount(
        &self,
        collection: &str,
        id_value: &Value,
        field: &str,
        amount: &Value,
    ) -> StoreResult<()> {
        let _ = (collection, id_value, field, amount);
        warn!("increment_field_by_amount is not implemented");
        Err(StoreError::not_implemented("increment_field_by_amount"))
    }

    /// Delete the first record matching every field of `params`
    fn delete_by_params(&self, collection: &str, params: &Document) -> StoreResult<()>;

    /// Delete every record of every collection
    ///
    /// Collections themselves are kept.
    fn clear(&self) -> StoreResult<()>;

    /// Clear, then add every record of `data` (collection name to records)
    ///
    /// Stops at the first failing add; records added before it stay.
    fn set_data(&self, data: &BTreeMap<String, Vec<Document>>) -> StoreResult<()> {
        self.clear()?;
        for (collection, records) in data {
            for record in records {
                self.add(collection, record)?;
            }
            info!("Seeded {} record(s) into {}", records.len(), collection);
        }
        Ok(())
    }

    /// Short, collision-prone id from the clock and a salt
    fn generate_unique_id(&self, salt: &str) -> String {
        store::generate_unique_id(salt)
    }

    /// Provision a collection with the default capacity
    fn create_collection(&self, name: &str) -> StoreResult<TableDescription> {
        self.create_collection_with_capacity(name, DEFAULT_READ_CAPACITY, DEFAULT_WRITE_CAPACITY)
    }

    /// Provision a collection keyed by the identifying field
    fn create_collection_with_capacity(
        &self,
        name: &str,
        read_capacity: u32,
        write_capacity: u32,
    ) -> StoreResult<TableDescription>;

    /// Status of a collection
    fn collection_status(&self, name: &str) -> StoreResult<TableStatus>;

    /// Name of the identifying field
    fn primary_key_identifier(&self) -> &str;
}

/// [`Persistence`] over a table service
pub struct Interface<S: TableService> {
    store: DataStore<S>,
    primary_key: String,
}

impl<S: TableService> Interface<S> {
    pub fn new(service: S, primary_key: impl Into<String>) -> Self {
        Self {
            store: DataStore::new(service),
            primary_key: primary_key.into(),
        }
    }

    /// The store adapter underneath
    pub fn store(&self) -> &DataStore<S> {
        &self.store
    }

    fn first_match(&self, collection: &str, filter: &ScanFilter) -> StoreResult<Option<Record>> {
        let items = self.store.items(collection)?;
        Ok(to_record(items.first(filter)?.as_ref()))
    }

    fn all_matches(&self, collection: &str, filter: &ScanFilter) -> StoreResult<Vec<Record>> {
        let items = self.store.items(collection)?;
        Ok(to_records(items.scan(filter)?))
    }
}

impl<'c> Interface<&'c Connection> {
    /// Interface keyed by the connection's configured identifying field
    pub fn from_connection(conn: &'c Connection) -> Self {
        Self::new(conn, conn.config().primary_key.clone())
    }
}

impl<S: TableService> Persistence for Interface<S> {
    fn add(&self, collection: &str, record: &Document) -> StoreResult<Record> {
        let present: Document = record
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        let attributes = sanitize_record(&present);

        let items = self.store.items(collection)?;
        let item = items.create(&attributes)?;
        debug!("Added record {} to {}", item.key, collection);
        Ok(Record::new(item.attributes))
    }

    fn replace(&self, collection: &str, record: &Document) -> StoreResult<Record> {
        let attributes = sanitize_record(record);

        let items = self.store.items(collection)?;
        let item = items.put(&attributes)?;
        debug!("Replaced record {} in {}", item.key, collection);
        Ok(Record::new(item.attributes))
    }

    fn find(&self, collection: &str, key: &str, value: &Value) -> StoreResult<Option<Record>> {
        self.first_match(collection, &ScanFilter::equals(key, sanitize_field(value)))
    }

    fn get_all_for_key_with_value(
        &self,
        collection: &str,
        key: &str,
        value: &Value,
    ) -> StoreResult<Vec<Record>> {
        self.all_matches(collection, &ScanFilter::equals(key, sanitize_field(value)))
    }

    fn get_by_params(&self, collection: &str, params: &Document) -> StoreResult<Vec<Record>> {
        self.all_matches(collection, &ScanFilter::Equals(sanitize_record(params)))
    }

    fn find_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        self.all_matches(collection, &ScanFilter::All)
    }

    fn containing_any(
        &self,
        collection: &str,
        key: &str,
        values: &[Value],
    ) -> StoreResult<Vec<Record>> {
        let items = self.store.items(collection)?;
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let filter = ScanFilter::In {
            attribute: key.to_string(),
            candidates: values.iter().map(sanitize_field).collect(),
        };
        Ok(to_records(items.scan(&filter)?))
    }

    fn array_contains(
        &self,
        collection: &str,
        key: &str,
        value: &Value,
    ) -> StoreResult<Vec<Record>> {
        let filter = ScanFilter::Contains {
            attribute: key.to_string(),
            value: sanitize_field(value),
        };
        self.all_matches(collection, &filter)
    }

    fn push_to_array(
        &self,
        collection: &str,
        id_key: &str,
        id_value: &Value,
        array_key: &str,
        value: &Value,
    ) -> StoreResult<()> {
        let items = self.store.items(collection)?;
        let filter = ScanFilter::equals(id_key, sanitize_field(id_value));

        match items.first(&filter)? {
            Some(item) => {
                items.add_to_set(&item, array_key, &sanitize_field(value))?;
                debug!("Pushed {} onto {}.{} of {}", value, collection, array_key, item.key);
            }
            None => warn!(
                "push_to_array: no record in {} with {} = {}",
                collection, id_key, id_value
            ),
        }
        Ok(())
    }

    fn remove_from_array(
        &self,
        collection: &str,
        id_key: &str,
        id_value: &Value,
        array_key: &str,
        value: &Value,
    ) -> StoreResult<()> {
        let items = self.store.items(collection)?;
        let filter = ScanFilter::equals(id_key, sanitize_field(id_value));

        match items.first(&filter)? {
            Some(item) => {
                items.delete_from_set(&item, array_key, &sanitize_field(value))?;
                debug!("Removed {} from {}.{} of {}", value, collection, array_key, item.key);
            }
            None => warn!(
                "remove_from_array: no record in {} with {} = {}",
                collection, id_key, id_value
            ),
        }
        Ok(())
    }

    fn update_field_with_value(
        &self,
        collection: &str,
        id_value: &Value,
        field: &str,
        value: &Value,
    ) -> StoreResult<()> {
        let items = self.store.items(collection)?;
        let filter = ScanFilter::equals(&self.primary_key, sanitize_field(id_value));

        match items.first(&filter)? {
            Some(item) => {
                items.set_attribute(&item, field, &sanitize_field(value))?;
                debug!("Updated {}.{} of {}", collection, field, item.key);
            }
            None => warn!(
                "update_field_with_value: no record in {} with {} = {}",
                collection, self.primary_key, id_value
            ),
        }
        Ok(())
    }

    fn delete_by_params(&self, collection: &str, params: &Document) -> StoreResult<()> {
        let items = self.store.items(collection)?;
        let filter = ScanFilter::Equals(sanitize_record(params));

        match items.first(&filter)? {
            Some(item) => {
                items.delete(&item)?;
                debug!("Deleted record {} from {}", item.key, collection);
            }
            None => warn!("delete_by_params: no record in {} matched", collection),
        }
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let collections = self.store.collections()?;
        let mut deleted = 0usize;

        for collection in &collections {
            let items = self.store.items(collection)?;
            for item in items.select()? {
                items.delete(&item)?;
                deleted += 1;
            }
        }

        info!(
            "Cleared {} record(s) from {} collection(s)",
            deleted,
            collections.len()
        );
        Ok(())
    }

    fn create_collection_with_capacity(
        &self,
        name: &str,
        read_capacity: u32,
        write_capacity: u32,
    ) -> StoreResult<TableDescription> {
        self.store
            .create_collection(name, &self.primary_key, read_capacity, write_capacity)
    }

    fn collection_status(&self, name: &str) -> StoreResult<TableStatus> {
        self.store.collection_status(name)
    }

    fn primary_key_identifier(&self) -> &str {
        &self.primary_key
    }
}
