//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/attrstore/config.toml)
//! 3. Environment variables (ATTRSTORE_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable prefix
const ENV_PREFIX: &str = "ATTRSTORE";

/// Identifying field used when none is configured
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Read capacity for new collections when none is given
pub const DEFAULT_READ_CAPACITY: u32 = 10;

/// Write capacity for new collections when none is given
pub const DEFAULT_WRITE_CAPACITY: u32 = 5;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for the local table service database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Name of the field that identifies a record
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Access key id presented to the table service
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Secret access key presented to the table service
    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Read capacity for collections created without one
    #[serde(default = "default_read_capacity")]
    pub read_capacity: u32,

    /// Write capacity for collections created without one
    #[serde(default = "default_write_capacity")]
    pub write_capacity: u32,

    /// Log file for the CLI (stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            primary_key: default_primary_key(),
            access_key_id: None,
            secret_access_key: None,
            read_capacity: DEFAULT_READ_CAPACITY,
            write_capacity: DEFAULT_WRITE_CAPACITY,
            log_file: None,
        }
    }
}

/// Access key pair presented when opening the table service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Placeholder pair accepted by the local service
    pub fn local() -> Self {
        Self::new("local", "local")
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (ATTRSTORE_DATA_DIR, ATTRSTORE_PRIMARY_KEY, ...)
    /// 2. Config file (~/.config/attrstore/config.toml or ATTRSTORE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // ATTRSTORE_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // ATTRSTORE_PRIMARY_KEY
        if let Ok(val) = std::env::var(format!("{}_PRIMARY_KEY", ENV_PREFIX)) {
            if !val.is_empty() {
                self.primary_key = val;
            }
        }

        // ATTRSTORE_ACCESS_KEY_ID
        if let Ok(val) = std::env::var(format!("{}_ACCESS_KEY_ID", ENV_PREFIX)) {
            self.access_key_id = if val.is_empty() { None } else { Some(val) };
        }

        // ATTRSTORE_SECRET_ACCESS_KEY
        if let Ok(val) = std::env::var(format!("{}_SECRET_ACCESS_KEY", ENV_PREFIX)) {
            self.secret_access_key = if val.is_empty() { None } else { Some(val) };
        }
    }

    /// Credentials for the table service, if both halves are configured
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some(Credentials::new(id, secret)),
            _ => None,
        }
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with ATTRSTORE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("attrstore")
            .join("config.toml")
    }

    /// Get the path to the local table service database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("tables.db")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("attrstore")
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

fn default_read_capacity() -> u32 {
    DEFAULT_READ_CAPACITY
}

fn default_write_capacity() -> u32 {
    DEFAULT_WRITE_CAPACITY
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "ATTRSTORE_DATA_DIR",
        "ATTRSTORE_PRIMARY_KEY",
        "ATTRSTORE_ACCESS_KEY_ID",
        "ATTRSTORE_SECRET_ACCESS_KEY",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.primary_key, "id");
        assert_eq!(config.read_capacity, 10);
        assert_eq!(config.write_capacity, 5);
        assert!(config.credentials().is_none());
        assert!(config.data_dir.ends_with("attrstore"));
    }

    #[test]
    fn test_database_path() {
        let config = Config::default();
        assert!(config.database_path().ends_with("tables.db"));
    }

    #[test]
    fn test_env_override_primary_key() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("ATTRSTORE_PRIMARY_KEY", "_id");
        config.apply_env_overrides();
        assert_eq!(config.primary_key, "_id");

        // Empty value keeps the current key
        env::set_var("ATTRSTORE_PRIMARY_KEY", "");
        config.apply_env_overrides();
        assert_eq!(config.primary_key, "_id");
    }

    #[test]
    fn test_env_override_credentials() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("ATTRSTORE_ACCESS_KEY_ID", "AKIDEXAMPLE");
        config.apply_env_overrides();
        // Only one half configured
        assert!(config.credentials().is_none());

        env::set_var("ATTRSTORE_SECRET_ACCESS_KEY", "secret");
        config.apply_env_overrides();
        assert_eq!(
            config.credentials(),
            Some(Credentials::new("AKIDEXAMPLE", "secret"))
        );

        env::set_var("ATTRSTORE_ACCESS_KEY_ID", "");
        config.apply_env_overrides();
        assert!(config.access_key_id.is_none());
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("ATTRSTORE_DATA_DIR", "/tmp/attrstore-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/attrstore-test"));
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            primary_key = "key"
            access_key_id = "id"
            secret_access_key = "secret"
            read_capacity = 100
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.primary_key, "key");
        assert_eq!(config.read_capacity, 100);
        assert_eq!(config.write_capacity, DEFAULT_WRITE_CAPACITY);
        assert!(config.credentials().is_some());
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.primary_key, DEFAULT_PRIMARY_KEY);
        assert!(config.access_key_id.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            data_dir: PathBuf::from("/data/attrstore"),
            primary_key: "uid".to_string(),
            access_key_id: Some("id".to_string()),
            secret_access_key: Some("secret".to_string()),
            read_capacity: 20,
            write_capacity: 10,
            log_file: None,
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.data_dir, config.data_dir);
        assert_eq!(loaded.primary_key, "uid");
        assert_eq!(loaded.credentials(), config.credentials());
        assert_eq!(loaded.read_capacity, 20);
        assert_eq!(loaded.write_capacity, 10);
    }
}
