//! # PMODigi Configuration Module
//!
//! This module provides configuration management for PMODigi, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Path and dotted-path getters and setters, persisted on every write
//! - Thread-safe singleton access pattern
//!
//! The same tree also serves as the persistent session store: the
//! `session.*` sub-tree is written by the DigiOnline client and survives
//! restarts because every `set` is flushed to `config.yaml`.
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! let config = get_config();
//!
//! // Dotted-path access
//! let hash = config.get_path("session.0.player_hash")?;
//! config.set_path("session.0.player_hash", "0123456789abcdef0123456789abcdef".into())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde::{de::DeserializeOwned, Serialize};
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{info, warn};

// Module de chiffrement des mots de passe
pub mod encryption;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmodigi.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load PMODigi configuration"));
}

const ENV_CONFIG_DIR: &str = "PMODIGI_CONFIG";
const ENV_PREFIX: &str = "PMODIGI_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmodigi";

const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Configuration manager for PMODigi
///
/// Holds the merged YAML tree behind a mutex. A configuration loaded from a
/// directory writes itself back to `config.yaml` after each change; one
/// built with [`Config::from_yaml_str`] lives in memory only.
#[derive(Debug)]
pub struct Config {
    config_dir: Option<String>,
    path: Option<String>,
    data: Mutex<Value>,
}

// Implémentation manuelle de Clone
impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.lock().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        CONFIG_DIR_NAME.to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMODIGI_CONFIG` environment variable
    /// 3. `.pmodigi` in the current directory
    /// 4. `.pmodigi` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for
    /// read/write permissions.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let yaml_data = if let Ok(data) = fs::read_to_string(&path) {
            info!(config_file = %path, "Loaded config file");
            data
        } else {
            info!(config_file = %path, "Config file not found, using default embedded config");
            String::new()
        };

        let mut config_value = Self::merged_with_defaults(&yaml_data)?;
        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir: Some(config_dir),
            path: Some(path),
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Builds an in-memory configuration from a YAML document
    ///
    /// The document is merged over the embedded defaults exactly like a
    /// `config.yaml` file, but nothing is ever written to disk and the
    /// environment is not consulted.
    ///
    /// ```
    /// use pmoconfig::Config;
    ///
    /// let config = Config::from_yaml_str("host: { logger: { min_level: DEBUG } }")?;
    /// assert_eq!(config.get_log_min_level()?, "DEBUG");
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(Config {
            config_dir: None,
            path: None,
            data: Mutex::new(Self::merged_with_defaults(yaml)?),
        })
    }

    fn merged_with_defaults(yaml: &str) -> Result<Value> {
        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        if !yaml.trim().is_empty() {
            let external_value: Value = serde_yaml::from_str(yaml)?;
            merge_yaml(&mut default_value, &external_value);
        }
        Ok(Self::lower_keys_value(default_value))
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        // A panic while holding the lock cannot leave the tree half-written:
        // every mutation is a single insert.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the configuration directory, if this configuration is file-backed
    pub fn directory(&self) -> Option<&str> {
        self.config_dir.as_deref()
    }

    /// Saves the current configuration to the config.yaml file
    ///
    /// The tree stays locked until the new file has been renamed into
    /// place. Does nothing for in-memory configurations.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = self.lock();
        let yaml = serde_yaml::to_string(&*data)?;
        let tmp_path = format!("{}.tmp", path);
        fs::write(&tmp_path, yaml)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["host", "logger", "min_level"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.lock();
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        // A null node on the way (e.g. a cleared entry) becomes a mapping again
        if data.is_null() {
            *data = Value::Mapping(Mapping::new());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                if let Some(next) = map.get(&Value::String(key.to_lowercase())) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    /// Gets the value stored at a dotted path (`"session.0.player_hash"`)
    ///
    /// Missing paths and explicit `null` values both read as `None`.
    pub fn get_path(&self, dotted: &str) -> Result<Option<Value>> {
        let keys = split_dotted(dotted)?;
        match self.get_value(&keys) {
            Ok(Value::Null) | Err(_) => Ok(None),
            Ok(value) => Ok(Some(value)),
        }
    }

    /// Sets the value at a dotted path, creating intermediate mappings
    pub fn set_path(&self, dotted: &str, value: Value) -> Result<()> {
        let keys = split_dotted(dotted)?;
        self.set_value(&keys, value)
    }

    /// Deserializes the value stored at a dotted path
    ///
    /// A value that no longer matches `T` is logged and treated as absent,
    /// so a stale on-disk layout never blocks the caller.
    pub fn get_path_as<T: DeserializeOwned>(&self, dotted: &str) -> Result<Option<T>> {
        match self.get_path(dotted)? {
            Some(value) => match serde_yaml::from_value(value) {
                Ok(typed) => Ok(Some(typed)),
                Err(e) => {
                    warn!(path = dotted, error = %e, "Ignoring unreadable stored value");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Serializes `value` and stores it at a dotted path
    pub fn set_path_from<T: Serialize>(&self, dotted: &str, value: &T) -> Result<()> {
        self.set_path(dotted, serde_yaml::to_value(value)?)
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(e) = Self::set_value_internal(config, &key_path, yaml_value) {
                    warn!(env_var = %key, error = %e, "Ignoring environment override");
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(key, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Récupère le niveau de log minimum depuis la configuration
    pub fn get_log_min_level(&self) -> Result<String> {
        match self.get_value(&["host", "logger", "min_level"]) {
            Ok(Value::String(s)) => Ok(s),
            _ => Ok(DEFAULT_LOG_MIN_LEVEL.to_string()),
        }
    }

    /// Définit le niveau de log minimum dans la configuration
    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

/// Returns the global configuration instance
///
/// The instance is lazily loaded on first access from the directory
/// resolved by [`Config::config_dir`].
///
/// # Panics
///
/// Panics if the configuration directory cannot be created or the
/// configuration file cannot be parsed.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

fn split_dotted(dotted: &str) -> Result<Vec<&str>> {
    let keys: Vec<&str> = dotted.split('.').collect();
    if keys.iter().any(|k| k.is_empty()) {
        return Err(anyhow!("Invalid configuration path '{}'", dotted));
    }
    Ok(keys)
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings, keys from external are merged recursively into default
/// - Scalars and sequences from external replace the default value
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_embedded() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config.get_log_min_level().unwrap(), "INFO");
        assert!(config.get_log_enable_console().unwrap());
        assert_eq!(
            config
                .get_path("accounts.digionline.base_url")
                .unwrap()
                .unwrap(),
            Value::String("https://digionline.hu".into())
        );
    }

    #[test]
    fn test_external_yaml_overrides_defaults() {
        let config = Config::from_yaml_str(
            "Accounts:\n  DigiOnline:\n    Max_Attempts: 2\n",
        )
        .unwrap();
        assert_eq!(
            config.get_value(&["accounts", "digionline", "max_attempts"]).unwrap(),
            Value::Number(2.into())
        );
        // untouched sibling keeps its default
        assert_eq!(
            config
                .get_value(&["accounts", "digionline", "refresh_window_secs"])
                .unwrap(),
            Value::Number(300.into())
        );
    }

    #[test]
    fn test_dotted_path_roundtrip() {
        let config = Config::from_yaml_str("").unwrap();
        assert!(config.get_path("session.3.player_hash").unwrap().is_none());

        config
            .set_path("session.3.player_hash", Value::String("abc".into()))
            .unwrap();
        assert_eq!(
            config.get_path("session.3.player_hash").unwrap(),
            Some(Value::String("abc".into()))
        );

        config.set_path("session.3.player_hash", Value::Null).unwrap();
        assert!(config.get_path("session.3.player_hash").unwrap().is_none());
    }

    #[test]
    fn test_set_path_through_null_node() {
        let config = Config::from_yaml_str("").unwrap();
        config.set_path("session.1", Value::Null).unwrap();
        config
            .set_path("session.1.last_refresh", Value::String("now".into()))
            .unwrap();
        assert!(config.get_path("session.1.last_refresh").unwrap().is_some());
    }

    #[test]
    fn test_invalid_dotted_path() {
        let config = Config::from_yaml_str("").unwrap();
        assert!(config.get_path("session..hash").is_err());
        assert!(config.set_path("", Value::Null).is_err());
    }

    #[test]
    fn test_typed_access_ignores_mismatched_values() {
        let config = Config::from_yaml_str("").unwrap();
        config
            .set_path("session.0.attempts", Value::String("many".into()))
            .unwrap();
        let typed: Option<u32> = config.get_path_as("session.0.attempts").unwrap();
        assert!(typed.is_none());

        config.set_path_from("session.0.attempts", &4u32).unwrap();
        let typed: Option<u32> = config.get_path_as("session.0.attempts").unwrap();
        assert_eq!(typed, Some(4));
    }

    #[test]
    fn test_file_backed_config_persists() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_string_lossy().to_string();

        let config = Config::load_config(&dir_str).unwrap();
        config
            .set_path("session.0.player_hash", Value::String("deadbeef".into()))
            .unwrap();

        let reloaded = Config::load_config(&dir_str).unwrap();
        assert_eq!(
            reloaded.get_path("session.0.player_hash").unwrap(),
            Some(Value::String("deadbeef".into()))
        );
        assert!(dir.path().join("config.yaml").exists());
    }

    #[test]
    fn test_concurrent_writers_keep_file_valid() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_string_lossy().to_string();
        let config = Arc::new(Config::load_config(&dir_str).unwrap());

        let writers: Vec<_> = (0..8)
            .map(|device| {
                let config = config.clone();
                std::thread::spawn(move || {
                    for i in 0..20 {
                        config
                            .set_path(
                                &format!("session.{device}.k{i}"),
                                Value::String(format!("v{i}")),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let reloaded = Config::load_config(&dir_str).unwrap();
        for device in 0..8 {
            for i in 0..20 {
                assert_eq!(
                    reloaded
                        .get_path(&format!("session.{device}.k{i}"))
                        .unwrap(),
                    Some(Value::String(format!("v{i}")))
                );
            }
        }
        assert!(!dir.path().join("config.yaml.tmp").exists());
    }
}
