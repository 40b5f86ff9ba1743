//! Local table service on SQLite
//!
//! Behaves like the hosted key-attribute service as far as the store
//! adapter can tell:
//!
//! - Tables must be provisioned with a hash key before use
//! - Items are written whole; a second write with the same hash key
//!   overwrites the first in place (scan order is kept)
//! - Set updates are typed: a number cannot join a string set
//! - Updating an attribute of a missing item creates the item
//! - Scans filter item by item, in insertion order
//!
//! Every call takes the connection lock for its own duration only. Nothing
//! is held between calls.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Number;
use tracing::{debug, info};

use crate::config::Credentials;
use crate::models::{numbers_equal, AttributeValue, Attributes};
use crate::storage::error::{BackendError, BackendResult};
use crate::storage::filter::ScanFilter;
use crate::storage::schema::{init_schema, needs_init};
use crate::storage::{CreateTableRequest, Item, KeySchema, TableDescription, TableService, TableStatus};

/// SQLite-backed table service
pub struct SqliteTableService {
    conn: Mutex<Connection>,
}

impl SqliteTableService {
    /// Open or create the service database at `path`
    pub fn open(path: impl AsRef<Path>, credentials: &Credentials) -> BackendResult<Self> {
        authenticate(credentials)?;
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| BackendError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| BackendError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Opened table service database at {:?}", path);
        Self::bootstrap(conn)
    }

    /// Open an in-memory service (for testing)
    pub fn open_in_memory(credentials: &Credentials) -> BackendResult<Self> {
        authenticate(credentials)?;
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> BackendResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        if needs_init(&conn) {
            init_schema(&conn)?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> BackendResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| BackendError::Poisoned)
    }

    /// Load, change and store one item in a single transaction
    ///
    /// `create_missing` decides whether a missing item is created from its
    /// key before `change` runs, or the update is skipped.
    fn update_item<F>(
        &self,
        table: &str,
        key: &AttributeValue,
        attribute: &str,
        create_missing: bool,
        change: F,
    ) -> BackendResult<()>
    where
        F: FnOnce(&mut Attributes) -> BackendResult<()>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let hash_key = hash_key_of(&tx, table)?;
        if attribute == hash_key {
            return Err(BackendError::KeyUpdate {
                table: table.to_string(),
                key: hash_key,
            });
        }
        let hash_value = key_string(table, &hash_key, key)?;

        let mut attributes = match load_item(&tx, table, &hash_value)? {
            Some(attributes) => attributes,
            None if create_missing => {
                debug!("Creating item {} in {} from update", hash_value, table);
                Attributes::from([(hash_key.clone(), key.clone())])
            }
            None => return Ok(()),
        };

        change(&mut attributes)?;
        store_item(&tx, table, &hash_value, &attributes)?;
        tx.commit()?;
        Ok(())
    }

    fn write_item(&self, table: &str, attributes: &Attributes) -> BackendResult<Item> {
        let conn = self.lock()?;
        let hash_key = hash_key_of(&conn, table)?;
        let key = attributes
            .get(&hash_key)
            .cloned()
            .ok_or_else(|| BackendError::MissingKey {
                table: table.to_string(),
                key: hash_key.clone(),
            })?;
        let hash_value = key_string(table, &hash_key, &key)?;

        store_item(&conn, table, &hash_value, attributes)?;

        Ok(Item {
            key,
            attributes: attributes.clone(),
        })
    }
}

impl TableService for SqliteTableService {
    fn list_tables(&self) -> BackendResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM tables ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn describe_table(&self, name: &str) -> BackendResult<TableDescription> {
        let conn = self.lock()?;
        describe(&conn, name)
    }

    fn create_table(&self, request: &CreateTableRequest) -> BackendResult<TableDescription> {
        let conn = self.lock()?;

        let exists: bool = conn
            .prepare("SELECT 1 FROM tables WHERE name = ?")?
            .exists(params![request.name])?;
        if exists {
            return Err(BackendError::TableExists(request.name.clone()));
        }

        conn.execute(
            "INSERT INTO tables (name, hash_key, read_capacity, write_capacity, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                request.name,
                request.hash_key,
                request.read_capacity,
                request.write_capacity,
                TableStatus::Active.as_str(),
                Utc::now().timestamp_millis(),
            ],
        )?;
        info!(
            "Created table {} (hash key {}, read {}, write {})",
            request.name, request.hash_key, request.read_capacity, request.write_capacity
        );

        describe(&conn, &request.name)
    }

    fn scan(&self, table: &str, filter: &ScanFilter) -> BackendResult<Vec<Item>> {
        let conn = self.lock()?;
        let hash_key = hash_key_of(&conn, table)?;

        let mut stmt =
            conn.prepare("SELECT attributes FROM items WHERE table_name = ? ORDER BY rowid")?;
        let rows = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;

        let mut items = Vec::new();
        for text in rows {
            let attributes = decode(table, &text)?;
            if !filter.matches(&attributes) {
                continue;
            }
            let key = attributes
                .get(&hash_key)
                .cloned()
                .ok_or_else(|| BackendError::MissingKey {
                    table: table.to_string(),
                    key: hash_key.clone(),
                })?;
            items.push(Item { key, attributes });
        }

        debug!("Scanned {}: {} item(s) matched", table, items.len());
        Ok(items)
    }

    fn create_item(&self, table: &str, attributes: &Attributes) -> BackendResult<Item> {
        self.write_item(table, attributes)
    }

    fn put_item(&self, table: &str, attributes: &Attributes) -> BackendResult<Item> {
        self.write_item(table, attributes)
    }

    fn add_to_set(
        &self,
        table: &str,
        key: &AttributeValue,
        attribute: &str,
        element: &AttributeValue,
    ) -> BackendResult<()> {
        let singleton = element
            .singleton_set()
            .ok_or_else(|| BackendError::TypeMismatch {
                attribute: attribute.to_string(),
                expected: "S or N",
                found: element.type_tag(),
            })?;

        self.update_item(table, key, attribute, true, |attributes| {
            match (attributes.get_mut(attribute), element) {
                (None, _) => {
                    attributes.insert(attribute.to_string(), singleton);
                }
                (Some(AttributeValue::StringSet(set)), AttributeValue::String(s)) => {
                    set.insert(s.clone());
                }
                (Some(AttributeValue::NumberSet(set)), AttributeValue::Number(n)) => {
                    insert_number(set, n);
                }
                (Some(stored), _) => {
                    return Err(BackendError::TypeMismatch {
                        attribute: attribute.to_string(),
                        expected: singleton.type_tag(),
                        found: stored.type_tag(),
                    });
                }
            }
            Ok(())
        })
    }

    fn delete_from_set(
        &self,
        table: &str,
        key: &AttributeValue,
        attribute: &str,
        element: &AttributeValue,
    ) -> BackendResult<()> {
        self.update_item(table, key, attribute, false, |attributes| {
            let now_empty = match (attributes.get_mut(attribute), element) {
                (None, _) => false,
                (Some(AttributeValue::StringSet(set)), AttributeValue::String(s)) => {
                    set.remove(s);
                    set.is_empty()
                }
                (Some(AttributeValue::NumberSet(set)), AttributeValue::Number(n)) => {
                    set.retain(|member| !numbers_equal(member, n));
                    set.is_empty()
                }
                (Some(stored), _) => {
                    return Err(BackendError::TypeMismatch {
                        attribute: attribute.to_string(),
                        expected: stored.type_tag(),
                        found: element.type_tag(),
                    });
                }
            };
            // Empty sets are not stored
            if now_empty {
                attributes.remove(attribute);
            }
            Ok(())
        })
    }

    fn set_attribute(
        &self,
        table: &str,
        key: &AttributeValue,
        attribute: &str,
        value: &AttributeValue,
    ) -> BackendResult<()> {
        self.update_item(table, key, attribute, true, |attributes| {
            attributes.insert(attribute.to_string(), value.clone());
            Ok(())
        })
    }

    fn delete_item(&self, table: &str, key: &AttributeValue) -> BackendResult<()> {
        let conn = self.lock()?;
        let hash_key = hash_key_of(&conn, table)?;
        let hash_value = key_string(table, &hash_key, key)?;
        conn.execute(
            "DELETE FROM items WHERE table_name = ?1 AND hash_value = ?2",
            params![table, hash_value],
        )?;
        Ok(())
    }
}

fn authenticate(credentials: &Credentials) -> BackendResult<()> {
    if credentials.access_key_id.trim().is_empty() {
        return Err(BackendError::Authentication(
            "access key id is empty".to_string(),
        ));
    }
    if credentials.secret_access_key.trim().is_empty() {
        return Err(BackendError::Authentication(
            "secret access key is empty".to_string(),
        ));
    }
    Ok(())
}

fn describe(conn: &Connection, name: &str) -> BackendResult<TableDescription> {
    let row = conn
        .query_row(
            "SELECT name, hash_key, read_capacity, write_capacity, status, created_at
             FROM tables WHERE name = ?",
            params![name],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            },
        )
        .optional()?;

    let (name, hash_key, read_capacity, write_capacity, status, created_at) =
        row.ok_or_else(|| BackendError::TableNotFound(name.to_string()))?;

    Ok(TableDescription {
        name,
        key_schema: KeySchema { hash_key },
        read_capacity,
        write_capacity,
        status: TableStatus::parse(&status).unwrap_or(TableStatus::Active),
        created_at: DateTime::<Utc>::from_timestamp_millis(created_at).unwrap_or_default(),
    })
}

fn hash_key_of(conn: &Connection, table: &str) -> BackendResult<String> {
    conn.query_row(
        "SELECT hash_key FROM tables WHERE name = ?",
        params![table],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| BackendError::TableNotFound(table.to_string()))
}

/// Stable text form of a hash key value, distinguishing `"1"` from `1`
fn key_string(table: &str, hash_key: &str, value: &AttributeValue) -> BackendResult<String> {
    match value {
        AttributeValue::String(s) => Ok(format!("S:{}", s)),
        AttributeValue::Number(n) => Ok(format!("N:{}", canonical_number(n))),
        other => Err(BackendError::InvalidKey {
            table: table.to_string(),
            key: hash_key.to_string(),
            found: other.type_tag(),
        }),
    }
}

fn canonical_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => (f as i64).to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

fn insert_number(set: &mut Vec<Number>, n: &Number) {
    if !set.iter().any(|member| numbers_equal(member, n)) {
        set.push(n.clone());
    }
}

fn load_item(conn: &Connection, table: &str, hash_value: &str) -> BackendResult<Option<Attributes>> {
    let text: Option<String> = conn
        .query_row(
            "SELECT attributes FROM items WHERE table_name = ?1 AND hash_value = ?2",
            params![table, hash_value],
            |row| row.get(0),
        )
        .optional()?;

    text.map(|text| decode(table, &text)).transpose()
}

fn store_item(
    conn: &Connection,
    table: &str,
    hash_value: &str,
    attributes: &Attributes,
) -> BackendResult<()> {
    let text = serde_json::to_string(attributes).map_err(|source| BackendError::CorruptItem {
        table: table.to_string(),
        source,
    })?;
    conn.execute(
        "INSERT INTO items (table_name, hash_value, attributes) VALUES (?1, ?2, ?3)
         ON CONFLICT(table_name, hash_value) DO UPDATE SET attributes = excluded.attributes",
        params![table, hash_value, text],
    )?;
    Ok(())
}

fn decode(table: &str, text: &str) -> BackendResult<Attributes> {
    serde_json::from_str(text).map_err(|source| BackendError::CorruptItem {
        table: table.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn service() -> SqliteTableService {
        let service = SqliteTableService::open_in_memory(&Credentials::local()).unwrap();
        for name in ["fruits", "posts"] {
            service
                .create_table(&CreateTableRequest {
                    name: name.to_string(),
                    hash_key: "id".to_string(),
                    read_capacity: 10,
                    write_capacity: 5,
                })
                .unwrap();
        }
        service
    }

    fn attrs(pairs: &[(&str, AttributeValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn string_set(values: &[&str]) -> AttributeValue {
        AttributeValue::StringSet(values.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>())
    }

    #[test]
    fn test_rejects_empty_credentials() {
        let err = SqliteTableService::open_in_memory(&Credentials::new("", "secret"))
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::Authentication(_)));

        let err = SqliteTableService::open_in_memory(&Credentials::new("id", " "))
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::Authentication(_)));
    }

    #[test]
    fn test_catalog() {
        let service = service();
        assert_eq!(service.list_tables().unwrap(), vec!["fruits", "posts"]);

        let description = service.describe_table("fruits").unwrap();
        assert_eq!(description.key_schema.hash_key, "id");
        assert_eq!(description.read_capacity, 10);
        assert_eq!(description.write_capacity, 5);
        assert_eq!(description.status, TableStatus::Active);

        assert!(matches!(
            service.describe_table("missing"),
            Err(BackendError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_create_existing_table_fails() {
        let service = service();
        let err = service
            .create_table(&CreateTableRequest {
                name: "fruits".to_string(),
                hash_key: "id".to_string(),
                read_capacity: 1,
                write_capacity: 1,
            })
            .unwrap_err();
        assert!(matches!(err, BackendError::TableExists(name) if name == "fruits"));
    }

    #[test]
    fn test_put_overwrites_in_place() {
        let service = service();
        service
            .put_item("fruits", &attrs(&[("id", "1".into()), ("name", "Apple".into())]))
            .unwrap();
        service
            .put_item("fruits", &attrs(&[("id", "2".into()), ("name", "Pear".into())]))
            .unwrap();
        service
            .put_item("fruits", &attrs(&[("id", "1".into()), ("color", "green".into())]))
            .unwrap();

        let items = service.scan("fruits", &ScanFilter::All).unwrap();
        assert_eq!(items.len(), 2);
        // Overwritten item keeps its scan position and loses old attributes
        assert_eq!(items[0].key, AttributeValue::from("1"));
        assert!(items[0].attributes.get("name").is_none());
        assert_eq!(items[0].attributes["color"], AttributeValue::from("green"));
    }

    #[test]
    fn test_string_and_number_keys_are_distinct() {
        let service = service();
        service.put_item("fruits", &attrs(&[("id", "1".into())])).unwrap();
        service.put_item("fruits", &attrs(&[("id", 1.into())])).unwrap();
        assert_eq!(service.scan("fruits", &ScanFilter::All).unwrap().len(), 2);
    }

    #[test]
    fn test_item_without_key_is_rejected() {
        let service = service();
        let err = service
            .create_item("fruits", &attrs(&[("name", "Apple".into())]))
            .unwrap_err();
        assert!(matches!(err, BackendError::MissingKey { .. }));

        let err = service
            .create_item("fruits", &attrs(&[("id", string_set(&["a"]))]))
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidKey { found: "SS", .. }));
    }

    #[test]
    fn test_scan_unknown_table() {
        let service = service();
        assert!(matches!(
            service.scan("vegetables", &ScanFilter::All),
            Err(BackendError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_set_add_and_delete() {
        let service = service();
        service.put_item("posts", &attrs(&[("id", "42".into())])).unwrap();
        let key = AttributeValue::from("42");

        service.add_to_set("posts", &key, "tags", &"new".into()).unwrap();
        service.add_to_set("posts", &key, "tags", &"rust".into()).unwrap();
        service.add_to_set("posts", &key, "tags", &"new".into()).unwrap();

        let item = &service.scan("posts", &ScanFilter::All).unwrap()[0];
        assert_eq!(item.attributes["tags"], string_set(&["new", "rust"]));

        service
            .delete_from_set("posts", &key, "tags", &"new".into())
            .unwrap();
        service
            .delete_from_set("posts", &key, "tags", &"rust".into())
            .unwrap();

        // Last element gone, attribute gone
        let item = &service.scan("posts", &ScanFilter::All).unwrap()[0];
        assert!(item.attributes.get("tags").is_none());
    }

    #[test]
    fn test_set_type_mismatch() {
        let service = service();
        service
            .put_item("posts", &attrs(&[("id", "42".into()), ("title", "Hi".into())]))
            .unwrap();
        let key = AttributeValue::from("42");
        service.add_to_set("posts", &key, "tags", &"new".into()).unwrap();

        let err = service
            .add_to_set("posts", &key, "tags", &AttributeValue::from(7))
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::TypeMismatch { expected: "NS", found: "SS", .. }
        ));

        let err = service
            .add_to_set("posts", &key, "title", &"x".into())
            .unwrap_err();
        assert!(matches!(err, BackendError::TypeMismatch { found: "S", .. }));
    }

    #[test]
    fn test_number_sets_dedupe_by_value() {
        let service = service();
        service.put_item("posts", &attrs(&[("id", "1".into())])).unwrap();
        let key = AttributeValue::from("1");

        service
            .add_to_set("posts", &key, "comment_ids", &AttributeValue::from(4))
            .unwrap();
        let four_float = AttributeValue::Number(Number::from_f64(4.0).unwrap());
        service
            .add_to_set("posts", &key, "comment_ids", &four_float)
            .unwrap();

        let item = &service.scan("posts", &ScanFilter::All).unwrap()[0];
        assert_eq!(item.attributes["comment_ids"].set_len(), Some(1));
    }

    #[test]
    fn test_updates_on_missing_item() {
        let service = service();
        let key = AttributeValue::from("ghost");

        // Removing from a missing item does nothing
        service
            .delete_from_set("posts", &key, "tags", &"new".into())
            .unwrap();
        assert!(service.scan("posts", &ScanFilter::All).unwrap().is_empty());

        // Setting an attribute creates it
        service
            .set_attribute("posts", &key, "title", &"Boo".into())
            .unwrap();
        let items = service.scan("posts", &ScanFilter::All).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].attributes,
            attrs(&[("id", "ghost".into()), ("title", "Boo".into())])
        );
    }

    #[test]
    fn test_hash_key_cannot_be_updated() {
        let service = service();
        service.put_item("posts", &attrs(&[("id", "1".into())])).unwrap();
        let err = service
            .set_attribute("posts", &"1".into(), "id", &"2".into())
            .unwrap_err();
        assert!(matches!(err, BackendError::KeyUpdate { .. }));
    }

    #[test]
    fn test_delete_item() {
        let service = service();
        service.put_item("fruits", &attrs(&[("id", "1".into())])).unwrap();
        service.delete_item("fruits", &"1".into()).unwrap();
        // Deleting again is fine
        service.delete_item("fruits", &"1".into()).unwrap();
        assert!(service.scan("fruits", &ScanFilter::All).unwrap().is_empty());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("tables.db");

        {
            let service = SqliteTableService::open(&path, &Credentials::local()).unwrap();
            service
                .create_table(&CreateTableRequest {
                    name: "fruits".to_string(),
                    hash_key: "id".to_string(),
                    read_capacity: 10,
                    write_capacity: 5,
                })
                .unwrap();
            service
                .put_item("fruits", &attrs(&[("id", "1".into()), ("quantity", 20.into())]))
                .unwrap();
        }

        let service = SqliteTableService::open(&path, &Credentials::local()).unwrap();
        let items = service.scan("fruits", &ScanFilter::All).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].attributes["quantity"], AttributeValue::from(20));
    }

    #[test]
    fn test_canonical_number() {
        assert_eq!(canonical_number(&Number::from(20)), "20");
        assert_eq!(canonical_number(&Number::from_f64(20.0).unwrap()), "20");
        assert_eq!(canonical_number(&Number::from_f64(2.5).unwrap()), "2.5");
        assert_eq!(canonical_number(&Number::from(u64::MAX)), u64::MAX.to_string());
    }
}
