//! attrstore Core Library
//!
//! Generic record persistence over a key-attribute table service. Application
//! code talks to the [`Persistence`] contract; this crate translates it into
//! table, scan and item calls and absorbs the service's quirks:
//!
//! - A table handle must load its key schema before item calls succeed
//! - Only strings, numbers and string/number sets can be stored
//! - Set fields are mutated one element at a time
//!
//! # Quick Start
//!
//! ```text
//! let conn = Connection::new(Config::load()?);
//! let interface = Interface::from_connection(&conn);
//!
//! interface.create_collection("fruits")?;
//! interface.add("fruits", &record)?;
//! let red = interface.get_all_for_key_with_value("fruits", "color", &json!("red"))?;
//! ```
//!
//! # Modules
//!
//! - `interface`: The persistence contract and its implementation (main entry point)
//! - `store`: Store adapter, collection activation and id generation
//! - `sanitizer`: Coerces application values into storable ones
//! - `models`: Attribute values and records
//! - `storage`: Table service trait, table handles and the SQLite backend
//! - `connection`: Lazily opened, shared connection to the backend
//! - `config`: Application configuration

pub mod config;
pub mod connection;
pub mod error;
pub mod interface;
pub mod models;
pub mod sanitizer;
pub mod storage;
pub mod store;

pub use config::{Config, Credentials};
pub use connection::Connection;
pub use error::{StoreError, StoreResult};
pub use interface::{Interface, Persistence};
pub use models::{AttributeValue, Attributes, Document, Record};
pub use sanitizer::{sanitize_field, sanitize_record};
pub use storage::{BackendError, ScanFilter, TableService, TableStatus};
pub use store::{generate_unique_id, DataStore};
