//! Store adapter
//!
//! The `DataStore` maps collection and record operations onto table service
//! calls. It owns two things the service leaves to the client:
//!
//! - Activation: a table handle cannot touch items until its key schema is
//!   loaded. Every collection operation goes through [`DataStore::activate`],
//!   which checks the catalog and loads the schema. Calling it again is
//!   harmless.
//! - Record ids: [`generate_unique_id`] derives a short id from the clock
//!   and a salt.
//!
//! ## Usage
//!
//! ```ignore
//! let store = DataStore::new(&conn);
//! let items = store.items("fruits")?;
//! let records = to_records(items.select()?);
//! ```

use std::fmt::Display;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::models::Record;
use crate::storage::{
    CreateTableRequest, Item, Items, Table, TableDescription, TableService, TableStatus,
};

/// Length of ids produced by [`generate_unique_id`]
pub const UNIQUE_ID_LEN: usize = 7;

/// Adapter between collections of records and a table service
pub struct DataStore<S: TableService> {
    service: S,
}

impl<S: TableService> DataStore<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// The underlying table service
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Names of every collection in the catalog
    pub fn collections(&self) -> StoreResult<Vec<String>> {
        Ok(self.service.list_tables()?)
    }

    /// Table handle for a collection, with its key schema loaded
    pub fn activate(&self, collection: &str) -> StoreResult<Table<'_, S>> {
        let known = self.service.list_tables()?;
        if !known.iter().any(|name| name == collection) {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }

        let table = Table::new(&self.service, collection);
        if !table.schema_loaded() {
            let hash_key = table.hash_key()?;
            debug!("Activated {} (hash key {})", collection, hash_key);
        }
        Ok(table)
    }

    /// Queryable records of a collection
    pub fn items(&self, collection: &str) -> StoreResult<Items<'_, S>> {
        Ok(self.activate(collection)?.items()?)
    }

    /// Provision a collection keyed by `hash_key`
    pub fn create_collection(
        &self,
        name: &str,
        hash_key: &str,
        read_capacity: u32,
        write_capacity: u32,
    ) -> StoreResult<TableDescription> {
        let description = self.service.create_table(&CreateTableRequest {
            name: name.to_string(),
            hash_key: hash_key.to_string(),
            read_capacity,
            write_capacity,
        })?;
        info!("Created collection {}", name);
        Ok(description)
    }

    /// Catalog entry of a collection
    pub fn describe_collection(&self, name: &str) -> StoreResult<TableDescription> {
        self.activate(name)?;
        Ok(self.service.describe_table(name)?)
    }

    /// Status of a collection as reported by the service
    pub fn collection_status(&self, name: &str) -> StoreResult<TableStatus> {
        Ok(self.activate(name)?.status()?)
    }
}

/// Plain record for an item, if there is one
pub fn to_record(item: Option<&Item>) -> Option<Record> {
    item.map(|item| Record::new(item.attributes.clone()))
}

/// Plain records for a list of items, in the same order
pub fn to_records(items: Vec<Item>) -> Vec<Record> {
    items
        .into_iter()
        .map(|item| Record::new(item.attributes))
        .collect()
}

/// Short id derived from the current time and a salt
///
/// Seven hex characters is about 28 bits. Ids are likely to collide once a
/// collection holds tens of thousands of records, so callers that need
/// uniqueness must check for it.
pub fn generate_unique_id(salt: impl Display) -> String {
    generate_unique_id_at(salt, Utc::now())
}

/// Id for a fixed timestamp
///
/// SHA-256 of the timestamp's text followed by the salt's text, as lowercase
/// hex, cut to [`UNIQUE_ID_LEN`] characters.
pub fn generate_unique_id_at(salt: impl Display, at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}{}", at, salt).as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..UNIQUE_ID_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::models::{AttributeValue, Attributes};
    use crate::storage::{BackendError, SqliteTableService};
    use chrono::TimeZone;

    fn test_store() -> DataStore<SqliteTableService> {
        let service = SqliteTableService::open_in_memory(&Credentials::local()).unwrap();
        let store = DataStore::new(service);
        store.create_collection("fruits", "id", 10, 5).unwrap();
        store
    }

    #[test]
    fn test_activate_loads_schema() {
        let store = test_store();
        let table = store.activate("fruits").unwrap();
        assert!(table.schema_loaded());
        assert_eq!(table.items().unwrap().hash_key(), "id");
    }

    #[test]
    fn test_activate_is_idempotent() {
        let store = test_store();
        store.activate("fruits").unwrap();
        store.activate("fruits").unwrap();
        assert!(store.items("fruits").unwrap().select().unwrap().is_empty());
    }

    #[test]
    fn test_activate_unknown_collection() {
        let store = test_store();
        let err = store.activate("vegetables").err().unwrap();
        assert!(matches!(err, StoreError::CollectionNotFound(name) if name == "vegetables"));
    }

    #[test]
    fn test_unactivated_handle_cannot_reach_items() {
        let store = test_store();
        let table = Table::new(store.service(), "fruits");
        assert!(matches!(
            table.items().err().unwrap(),
            BackendError::SchemaNotLoaded(_)
        ));
    }

    #[test]
    fn test_create_existing_collection() {
        let store = test_store();
        let err = store.create_collection("fruits", "id", 1, 1).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Backend(BackendError::TableExists(_))
        ));
    }

    #[test]
    fn test_collection_status_and_description() {
        let store = test_store();
        assert_eq!(store.collection_status("fruits").unwrap(), TableStatus::Active);

        let description = store.describe_collection("fruits").unwrap();
        assert_eq!(description.read_capacity, 10);
        assert_eq!(description.write_capacity, 5);

        assert!(matches!(
            store.collection_status("vegetables"),
            Err(StoreError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn test_to_record() {
        assert_eq!(to_record(None), None);

        let mut attributes = Attributes::new();
        attributes.insert("id".to_string(), AttributeValue::from("1"));
        attributes.insert("name".to_string(), AttributeValue::from("Apple"));
        let item = Item {
            key: AttributeValue::from("1"),
            attributes: attributes.clone(),
        };

        let record = to_record(Some(&item)).unwrap();
        assert_eq!(record.attributes(), &attributes);
        assert_eq!(to_records(vec![item]), vec![record]);
    }

    #[test]
    fn test_unique_id_shape() {
        let id = generate_unique_id("apple");
        assert_eq!(id.len(), UNIQUE_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_unique_id_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(generate_unique_id_at("apple", at), "5c837cd");
        assert_eq!(generate_unique_id_at("apple", at), generate_unique_id_at("apple", at));
        assert_eq!(generate_unique_id_at("pear", at), "68b0e91");
    }

    #[test]
    fn test_unique_id_salt_display() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(generate_unique_id_at(42, at), generate_unique_id_at("42", at));
    }
}
