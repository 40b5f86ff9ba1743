//! Table service layer
//!
//! The capability set the store adapter needs from a key-attribute table
//! service, plus the client-side handles used to reach it.
//!
//! ## Schema loading
//!
//! A [`Table`] handle starts without its key schema. Item operations on it
//! fail with [`BackendError::SchemaNotLoaded`] until the schema has been
//! loaded by asking for the table's hash key ([`Table::hash_key`]). The
//! store adapter does this on every activation.
//!
//! ## Backends
//!
//! - [`SqliteTableService`]: local service backed by a SQLite file or memory

use std::cell::OnceCell;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AttributeValue, Attributes};

pub mod error;
pub mod filter;
pub mod schema;
pub mod sqlite;

pub use error::{BackendError, BackendResult};
pub use filter::ScanFilter;
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use sqlite::SqliteTableService;

/// Key structure of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Attribute whose value identifies an item
    pub hash_key: String,
}

/// Lifecycle state reported by the service for a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    Creating,
    Active,
    Updating,
    Deleting,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Creating => "CREATING",
            TableStatus::Active => "ACTIVE",
            TableStatus::Updating => "UPDATING",
            TableStatus::Deleting => "DELETING",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATING" => Some(TableStatus::Creating),
            "ACTIVE" => Some(TableStatus::Active),
            "UPDATING" => Some(TableStatus::Updating),
            "DELETING" => Some(TableStatus::Deleting),
            _ => None,
        }
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry for a table
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescription {
    pub name: String,
    pub key_schema: KeySchema,
    pub read_capacity: u32,
    pub write_capacity: u32,
    pub status: TableStatus,
    pub created_at: DateTime<Utc>,
}

/// Request to provision a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTableRequest {
    pub name: String,
    pub hash_key: String,
    pub read_capacity: u32,
    pub write_capacity: u32,
}

/// A stored item as returned by the service
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Value of the table's hash key attribute
    pub key: AttributeValue,
    pub attributes: Attributes,
}

/// Capabilities required of a key-attribute table service
///
/// Each call is one blocking round trip. Item-level calls address the item
/// by its hash key value; they do not lock anything between calls.
pub trait TableService {
    /// Names of all tables in the catalog
    fn list_tables(&self) -> BackendResult<Vec<String>>;

    /// Key schema, capacity and status of a table
    fn describe_table(&self, name: &str) -> BackendResult<TableDescription>;

    /// Provision a new table
    fn create_table(&self, request: &CreateTableRequest) -> BackendResult<TableDescription>;

    /// Items of a table matching the filter, in the service's scan order
    fn scan(&self, table: &str, filter: &ScanFilter) -> BackendResult<Vec<Item>>;

    /// Create an item
    fn create_item(&self, table: &str, attributes: &Attributes) -> BackendResult<Item>;

    /// Write an item whole, replacing any item with the same hash key
    fn put_item(&self, table: &str, attributes: &Attributes) -> BackendResult<Item>;

    /// Add one element to a set attribute, creating the set if absent
    fn add_to_set(
        &self,
        table: &str,
        key: &AttributeValue,
        attribute: &str,
        element: &AttributeValue,
    ) -> BackendResult<()>;

    /// Remove one element from a set attribute
    fn delete_from_set(
        &self,
        table: &str,
        key: &AttributeValue,
        attribute: &str,
        element: &AttributeValue,
    ) -> BackendResult<()>;

    /// Overwrite a single attribute
    fn set_attribute(
        &self,
        table: &str,
        key: &AttributeValue,
        attribute: &str,
        value: &AttributeValue,
    ) -> BackendResult<()>;

    /// Delete an item
    fn delete_item(&self, table: &str, key: &AttributeValue) -> BackendResult<()>;
}

macro_rules! forward_table_service {
    ($target:ty) => {
        impl<T: TableService + ?Sized> TableService for $target {
            fn list_tables(&self) -> BackendResult<Vec<String>> {
                (**self).list_tables()
            }

            fn describe_table(&self, name: &str) -> BackendResult<TableDescription> {
                (**self).describe_table(name)
            }

            fn create_table(
                &self,
                request: &CreateTableRequest,
            ) -> BackendResult<TableDescription> {
                (**self).create_table(request)
            }

            fn scan(&self, table: &str, filter: &ScanFilter) -> BackendResult<Vec<Item>> {
                (**self).scan(table, filter)
            }

            fn create_item(&self, table: &str, attributes: &Attributes) -> BackendResult<Item> {
                (**self).create_item(table, attributes)
            }

            fn put_item(&self, table: &str, attributes: &Attributes) -> BackendResult<Item> {
                (**self).put_item(table, attributes)
            }

            fn add_to_set(
                &self,
                table: &str,
                key: &AttributeValue,
                attribute: &str,
                element: &AttributeValue,
            ) -> BackendResult<()> {
                (**self).add_to_set(table, key, attribute, element)
            }

            fn delete_from_set(
                &self,
                table: &str,
                key: &AttributeValue,
                attribute: &str,
                element: &AttributeValue,
            ) -> BackendResult<()> {
                (**self).delete_from_set(table, key, attribute, element)
            }

            fn set_attribute(
                &self,
                table: &str,
                key: &AttributeValue,
                attribute: &str,
                value: &AttributeValue,
            ) -> BackendResult<()> {
                (**self).set_attribute(table, key, attribute, value)
            }

            fn delete_item(&self, table: &str, key: &AttributeValue) -> BackendResult<()> {
                (**self).delete_item(table, key)
            }
        }
    };
}

forward_table_service!(&T);
forward_table_service!(Arc<T>);
forward_table_service!(Box<T>);

/// Client-side handle to one table
///
/// Cheap to create. Holds the key schema once it has been loaded.
pub struct Table<'s, S: TableService + ?Sized> {
    service: &'s S,
    name: String,
    schema: OnceCell<KeySchema>,
}

impl<'s, S: TableService + ?Sized> Table<'s, S> {
    /// Create a handle with no schema loaded
    pub fn new(service: &'s S, name: impl Into<String>) -> Self {
        Self {
            service,
            name: name.into(),
            schema: OnceCell::new(),
        }
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the key schema has been loaded on this handle
    pub fn schema_loaded(&self) -> bool {
        self.schema.get().is_some()
    }

    /// Hash key attribute name, loading the key schema if needed
    pub fn hash_key(&self) -> BackendResult<&str> {
        if let Some(schema) = self.schema.get() {
            return Ok(&schema.hash_key);
        }
        let description = self.service.describe_table(&self.name)?;
        let schema = self.schema.get_or_init(|| description.key_schema);
        Ok(&schema.hash_key)
    }

    /// Current status as reported by the service
    pub fn status(&self) -> BackendResult<TableStatus> {
        Ok(self.service.describe_table(&self.name)?.status)
    }

    /// Item collection of this table
    ///
    /// Fails with `SchemaNotLoaded` until [`Table::hash_key`] has been called.
    pub fn items(&self) -> BackendResult<Items<'s, S>> {
        let schema = self
            .schema
            .get()
            .ok_or_else(|| BackendError::SchemaNotLoaded(self.name.clone()))?;
        Ok(Items {
            service: self.service,
            table: self.name.clone(),
            hash_key: schema.hash_key.clone(),
        })
    }
}

/// Queryable item collection of a table with a loaded schema
pub struct Items<'s, S: TableService + ?Sized> {
    service: &'s S,
    table: String,
    hash_key: String,
}

impl<'s, S: TableService + ?Sized> Items<'s, S> {
    /// Table name
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Hash key attribute name
    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    /// Every item
    pub fn select(&self) -> BackendResult<Vec<Item>> {
        self.service.scan(&self.table, &ScanFilter::All)
    }

    /// Items matching a filter
    pub fn scan(&self, filter: &ScanFilter) -> BackendResult<Vec<Item>> {
        self.service.scan(&self.table, filter)
    }

    /// First item matching a filter, in scan order
    pub fn first(&self, filter: &ScanFilter) -> BackendResult<Option<Item>> {
        Ok(self.scan(filter)?.into_iter().next())
    }

    /// Create an item
    pub fn create(&self, attributes: &Attributes) -> BackendResult<Item> {
        self.service.create_item(&self.table, attributes)
    }

    /// Write an item whole, replacing the one with the same hash key
    pub fn put(&self, attributes: &Attributes) -> BackendResult<Item> {
        self.service.put_item(&self.table, attributes)
    }

    /// Add an element to one of the item's set attributes
    pub fn add_to_set(
        &self,
        item: &Item,
        attribute: &str,
        element: &AttributeValue,
    ) -> BackendResult<()> {
        self.service
            .add_to_set(&self.table, &item.key, attribute, element)
    }

    /// Remove an element from one of the item's set attributes
    pub fn delete_from_set(
        &self,
        item: &Item,
        attribute: &str,
        element: &AttributeValue,
    ) -> BackendResult<()> {
        self.service
            .delete_from_set(&self.table, &item.key, attribute, element)
    }

    /// Overwrite one of the item's attributes
    pub fn set_attribute(
        &self,
        item: &Item,
        attribute: &str,
        value: &AttributeValue,
    ) -> BackendResult<()> {
        self.service
            .set_attribute(&self.table, &item.key, attribute, value)
    }

    /// Delete the item
    pub fn delete(&self, item: &Item) -> BackendResult<()> {
        self.service.delete_item(&self.table, &item.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    fn service_with_fruits() -> SqliteTableService {
        let service = SqliteTableService::open_in_memory(&Credentials::local()).unwrap();
        service
            .create_table(&CreateTableRequest {
                name: "fruits".to_string(),
                hash_key: "id".to_string(),
                read_capacity: 10,
                write_capacity: 5,
            })
            .unwrap();
        service
    }

    #[test]
    fn test_items_require_loaded_schema() {
        let service = service_with_fruits();
        let table = Table::new(&service, "fruits");

        assert!(!table.schema_loaded());
        let err = table.items().err().unwrap();
        assert!(matches!(err, BackendError::SchemaNotLoaded(name) if name == "fruits"));

        assert_eq!(table.hash_key().unwrap(), "id");
        assert!(table.schema_loaded());
        assert_eq!(table.items().unwrap().hash_key(), "id");
    }

    #[test]
    fn test_hash_key_on_unknown_table() {
        let service = service_with_fruits();
        let table = Table::new(&service, "vegetables");
        let err = table.hash_key().unwrap_err();
        assert!(matches!(err, BackendError::TableNotFound(_)));
        assert!(!table.schema_loaded());
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for status in [
            TableStatus::Creating,
            TableStatus::Active,
            TableStatus::Updating,
            TableStatus::Deleting,
        ] {
            assert_eq!(TableStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TableStatus::parse("GONE"), None);
    }

    #[test]
    fn test_forwarding_through_arc() {
        let service = Arc::new(service_with_fruits());
        let table = Table::new(&service, "fruits");
        assert_eq!(table.status().unwrap(), TableStatus::Active);
    }
}
