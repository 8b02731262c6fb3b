//! # pmoconfig - Configuration de pmolink
//!
//! This crate provides configuration management for pmolink, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - Thread-safe singleton access pattern
//!
//! Domain-specific getters (nodes, Spotify credentials, reconnect policy) are
//! added by extension traits in the crates that own those concerns, e.g.
//! `pmolink::LinkConfigExt`.
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! let config = get_config();
//! let level = config.get_log_min_level()?;
//! let search = config.get_string(&["link", "search_type"])?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::{debug, info};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmolink.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load pmolink configuration"));
}

const ENV_CONFIG_DIR: &str = "PMOLINK_CONFIG";
const ENV_PREFIX: &str = "PMOLINK_CONFIG__";
const DEFAULT_CONFIG_DIR: &str = ".pmolink";

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

/// Configuration manager for pmolink
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
///
/// A `Config` built with [`Config::from_yaml_str`] lives only in memory:
/// setters update it but nothing is written to disk.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: Option<String>,
    data: Mutex<Value>,
}

// Implémentation manuelle de Clone
impl Clone for Config {
    fn clone(&self) -> Self {
        let data = match self.data.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
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
            info!(env_var=ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(DEFAULT_CONFIG_DIR).exists() {
            return DEFAULT_CONFIG_DIR.to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(DEFAULT_CONFIG_DIR);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        DEFAULT_CONFIG_DIR.to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("Le chemin spécifié n'est pas un répertoire"));
        }

        // Lecture seule suffit : la configuration n'est écrite que sur demande explicite
        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMOLINK_CONFIG` environment variable
    /// 3. `.pmolink` in the current directory
    /// 4. `.pmolink` in the user's home directory
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
    ///
    /// Unlike setters, loading never writes the file back.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir=%config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let external = match fs::read(&path) {
            Ok(data) => {
                info!(config_file=%path, "Loaded config file");
                Some(serde_yaml::from_slice::<Value>(&data)?)
            }
            Err(_) => {
                info!(config_file=%path, "Config file not found, using default embedded config");
                None
            }
        };

        let data = Self::build_value(external.as_ref())?;

        Ok(Config {
            config_dir,
            path: Some(path),
            data: Mutex::new(data),
        })
    }

    /// Builds an in-memory configuration from a YAML document
    ///
    /// The document is merged over the embedded defaults and environment
    /// overrides are applied, exactly as for [`Config::load_config`].
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let external: Value = serde_yaml::from_str(yaml)?;
        let data = Self::build_value(Some(&external))?;

        Ok(Config {
            config_dir: String::new(),
            path: None,
            data: Mutex::new(data),
        })
    }

    fn build_value(external: Option<&Value>) -> Result<Value> {
        let mut value = Self::lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);
        if let Some(external) = external {
            // Normaliser avant la fusion pour que "Spotify" et "spotify" se rejoignent
            merge_yaml(&mut value, &Self::lower_keys_value(external.clone()));
        }
        Self::apply_env_overrides(&mut value);
        Ok(value)
    }

    /// Returns the directory the configuration was loaded from
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    /// Saves the current configuration to the config.yaml file
    ///
    /// Does nothing for in-memory configurations.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let yaml = {
            let data = self.lock()?;
            serde_yaml::to_string(&*data)?
        };
        fs::write(path, yaml)?;
        debug!(config_file=%path, "Configuration saved");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("Configuration lock poisoned"))
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["link", "search_type"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.lock()?;
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
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
        let data = self.lock()?;
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = key.to_lowercase();

                if let Some(next) = map.get(&Value::String(key)) {
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

    /// Désérialise la valeur située à `path` dans un type fort
    ///
    /// # Exemple
    ///
    /// ```no_run
    /// # use pmoconfig::get_config;
    /// let market: String = get_config().get_typed(&["spotify", "market"])?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn get_typed<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T> {
        let value = self.get_value(path)?;
        serde_yaml::from_value(value)
            .map_err(|e| anyhow!("Invalid value at {}: {}", path.join("."), e))
    }

    /// Récupère une chaîne non vide, `None` si absente ou vide
    pub fn get_string(&self, path: &[&str]) -> Result<Option<String>> {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s)),
            Ok(Value::Number(n)) => Ok(Some(n.to_string())),
            Ok(_) | Err(_) => Ok(None),
        }
    }

    /// Récupère un entier positif, `None` si absent ou d'un autre type
    pub fn get_u64(&self, path: &[&str]) -> Result<Option<u64>> {
        match self.get_value(path) {
            Ok(Value::Number(n)) => Ok(n.as_u64()),
            Ok(Value::String(s)) => Ok(s.trim().parse::<u64>().ok()),
            Ok(_) | Err(_) => Ok(None),
        }
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(err) = Self::set_value_internal(config, &key_path, yaml_value) {
                    debug!(env_var=%key, error=%err, "Ignoring environment override");
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
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
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
/// The instance is lazily loaded on first access. Callers that need an
/// isolated configuration (tests, embedding) should build their own with
/// [`Config::load_config`] or [`Config::from_yaml_str`].
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings (objects), it merges keys from external into default
/// - For scalars and sequences, external values replace default values
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
        (d, e) => *d = e.clone(), // pour les scalaires ou séquences, on remplace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_embedded() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert_eq!(
            config.get_string(&["link", "search_type"]).unwrap(),
            Some("ytsearch".to_string())
        );
        assert_eq!(
            config.get_u64(&["link", "reconnect", "max_delay_seconds"]).unwrap(),
            Some(300)
        );
        assert!(config.get_log_enable_console().unwrap());
    }

    #[test]
    fn test_external_values_override_defaults() {
        let config = Config::from_yaml_str(
            "link:\n  search_type: scsearch\nSpotify:\n  Client_ID: abc\n",
        )
        .unwrap();
        assert_eq!(
            config.get_string(&["link", "search_type"]).unwrap(),
            Some("scsearch".to_string())
        );
        // Les clés sont normalisées en minuscules
        assert_eq!(
            config.get_string(&["spotify", "client_id"]).unwrap(),
            Some("abc".to_string())
        );
        // Les autres valeurs par défaut sont conservées
        assert_eq!(
            config.get_string(&["spotify", "market"]).unwrap(),
            Some("US".to_string())
        );
    }

    #[test]
    fn test_empty_string_reads_as_none() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert_eq!(config.get_string(&["spotify", "client_id"]).unwrap(), None);
        assert_eq!(config.get_string(&["does", "not", "exist"]).unwrap(), None);
    }

    #[test]
    fn test_set_value_in_memory() {
        let config = Config::from_yaml_str("{}").unwrap();
        config
            .set_value(&["link", "reconnect", "max_attempts"], Value::from(5u64))
            .unwrap();
        assert_eq!(
            config.get_u64(&["link", "reconnect", "max_attempts"]).unwrap(),
            Some(5)
        );
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert!(config.get_value(&["link", "nope"]).is_err());
    }

    #[test]
    fn test_get_typed() {
        let config = Config::from_yaml_str("link:\n  nodes:\n    - a\n    - b\n").unwrap();
        let nodes: Vec<String> = config.get_typed(&["link", "nodes"]).unwrap();
        assert_eq!(nodes, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_merge_replaces_sequences() {
        let mut default: Value = serde_yaml::from_str("a: [1, 2]\nb: {c: 1, d: 2}").unwrap();
        let external: Value = serde_yaml::from_str("a: [3]\nb: {d: 4}").unwrap();
        merge_yaml(&mut default, &external);

        let expected: Value = serde_yaml::from_str("a: [3]\nb: {c: 1, d: 4}").unwrap();
        assert_eq!(default, expected);
    }

    #[test]
    fn test_convert_env_value() {
        assert_eq!(Config::convert_env_value("42"), Value::from(42u64));
        assert_eq!(Config::convert_env_value("true"), Value::Bool(true));
        assert_eq!(
            Config::convert_env_value("hello"),
            Value::String("hello".to_string())
        );
    }

    #[test]
    fn test_load_config_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "host:\n  logger:\n    min_level: DEBUG\n",
        )
        .unwrap();

        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.get_log_min_level().unwrap(), "DEBUG");

        config.set_log_min_level("WARN".to_string()).unwrap();
        let reloaded = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(reloaded.get_log_min_level().unwrap(), "WARN");
    }
}
