//! Connection to the table service
//!
//! A `Connection` is built once from the configuration and shared by
//! reference. The backend is opened on first use, credentials are checked
//! at that point, and the open service is kept for the connection's lifetime.
//!
//! ```ignore
//! let conn = Connection::new(Config::load()?);
//! let interface = Interface::new(&conn, conn.config().primary_key.clone());
//! ```

use std::path::PathBuf;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::config::Config;
use crate::models::{AttributeValue, Attributes};
use crate::storage::{
    BackendError, BackendResult, CreateTableRequest, Item, ScanFilter, SqliteTableService,
    TableDescription, TableService,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Lazily opened handle to the table service
pub struct Connection {
    config: Config,
    location: Location,
    service: OnceCell<SqliteTableService>,
}

impl Connection {
    /// Connection to the database under the configured data directory
    pub fn new(config: Config) -> Self {
        let location = Location::File(config.database_path());
        Self {
            config,
            location,
            service: OnceCell::new(),
        }
    }

    /// Connection to a private in-memory service
    pub fn in_memory(config: Config) -> Self {
        Self {
            config,
            location: Location::Memory,
            service: OnceCell::new(),
        }
    }

    /// Configuration this connection was built from
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether the backend has been opened yet
    pub fn is_open(&self) -> bool {
        self.service.get().is_some()
    }

    /// The open service, opening it on first call
    ///
    /// A failed open is not cached; the next call tries again.
    pub fn service(&self) -> BackendResult<&SqliteTableService> {
        self.service.get_or_try_init(|| {
            let credentials = self.config.credentials().ok_or_else(|| {
                BackendError::Authentication(
                    "access key id and secret access key must both be configured".to_string(),
                )
            })?;

            match &self.location {
                Location::File(path) => {
                    debug!("Opening table service at {:?}", path);
                    SqliteTableService::open(path, &credentials)
                }
                Location::Memory => {
                    debug!("Opening in-memory table service");
                    SqliteTableService::open_in_memory(&credentials)
                }
            }
        })
    }
}

impl TableService for Connection {
    fn list_tables(&self) -> BackendResult<Vec<String>> {
        self.service()?.list_tables()
    }

    fn describe_table(&self, name: &str) -> BackendResult<TableDescription> {
        self.service()?.describe_table(name)
    }

    fn create_table(&self, request: &CreateTableRequest) -> BackendResult<TableDescription> {
        self.service()?.create_table(request)
    }

    fn scan(&self, table: &str, filter: &ScanFilter) -> BackendResult<Vec<Item>> {
        self.service()?.scan(table, filter)
    }

    fn create_item(&self, table: &str, attributes: &Attributes) -> BackendResult<Item> {
        self.service()?.create_item(table, attributes)
    }

    fn put_item(&self, table: &str, attributes: &Attributes) -> BackendResult<Item> {
        self.service()?.put_item(table, attributes)
    }

    fn add_to_set(
        &self,
        table: &str,
        key: &AttributeValue,
        attribute: &str,
        element: &AttributeValue,
    ) -> BackendResult<()> {
        self.service()?.add_to_set(table, key, attribute, element)
    }

    fn delete_from_set(
        &self,
        table: &str,
        key: &AttributeValue,
        attribute: &str,
        element: &AttributeValue,
    ) -> BackendResult<()> {
        self.service()?
            .delete_from_set(table, key, attribute, element)
    }

    fn set_attribute(
        &self,
        table: &str,
        key: &AttributeValue,
        attribute: &str,
        value: &AttributeValue,
    ) -> BackendResult<()> {
        self.service()?.set_attribute(table, key, attribute, value)
    }

    fn delete_item(&self, table: &str, key: &AttributeValue) -> BackendResult<()> {
        self.service()?.delete_item(table, key)
    }
}
