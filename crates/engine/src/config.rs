//! Store configuration via `recordstore.toml`
//!
//! A store opened from a directory reads its settings from a TOML file in
//! that directory. On first open a commented default file is written; to
//! change settings, edit the file and reopen the store.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use recordstore_core::{StoreError, StoreResult};
use recordstore_storage::{DurabilityMode, DEFAULT_INDEX_MAP};

use crate::codec::AnyCodec;

/// Config file name placed in the store directory.
pub const CONFIG_FILE_NAME: &str = "recordstore.toml";

/// Default sub-map holding record envelopes.
pub const DEFAULT_DATA_MAP: &str = "data";

/// Store configuration loaded from `recordstore.toml`.
///
/// # Example
///
/// ```toml
/// durability = "standard"
/// codec = "json"
/// rebuild_index_on_open = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory for the write-ahead log; absent means an in-memory store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Durability mode: `"standard"` or `"always"`.
    #[serde(default = "default_durability_str")]
    pub durability: String,
    /// Payload codec: `"json"` or `"msgpack"`.
    #[serde(default = "default_codec_str")]
    pub codec: String,
    /// Sub-map holding record envelopes.
    #[serde(default = "default_data_map")]
    pub data_map: String,
    /// Sub-map holding the type index.
    #[serde(default = "default_index_map")]
    pub index_map: String,
    /// Rebuild the type index from the data sub-map when the store opens.
    #[serde(default)]
    pub rebuild_index_on_open: bool,
}

fn default_durability_str() -> String {
    "standard".to_string()
}

fn default_codec_str() -> String {
    "json".to_string()
}

fn default_data_map() -> String {
    DEFAULT_DATA_MAP.to_string()
}

fn default_index_map() -> String {
    DEFAULT_INDEX_MAP.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            durability: default_durability_str(),
            codec: default_codec_str(),
            data_map: default_data_map(),
            index_map: default_index_map(),
            rebuild_index_on_open: false,
        }
    }
}

impl StoreConfig {
    /// In-memory configuration with defaults.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Durable configuration rooted at `dir`.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Parse the durability string into a `DurabilityMode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"standard"` or `"always"`.
    pub fn durability_mode(&self) -> StoreResult<DurabilityMode> {
        match self.durability.as_str() {
            "standard" => Ok(DurabilityMode::standard_default()),
            "always" => Ok(DurabilityMode::Strict),
            other => Err(StoreError::InvalidInput(format!(
                "Invalid durability mode '{}' in {}. Expected \"standard\" or \"always\".",
                other, CONFIG_FILE_NAME
            ))),
        }
    }

    /// Parse the codec string into an `AnyCodec`.
    pub fn codec(&self) -> StoreResult<AnyCodec> {
        self.codec.parse()
    }

    /// Check every field that can be wrong.
    pub fn validate(&self) -> StoreResult<()> {
        self.durability_mode()?;
        self.codec()?;
        if self.data_map.is_empty() || self.index_map.is_empty() {
            return Err(StoreError::InvalidInput(
                "Sub-map names cannot be empty".to_string(),
            ));
        }
        if self.data_map == self.index_map {
            return Err(StoreError::InvalidInput(format!(
                "data_map and index_map must differ, both are '{}'",
                self.data_map
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Recordstore configuration
#
# Durability mode: "standard" (default) or "always"
#   "standard" = periodic fsync (~100ms), may lose last interval on crash
#   "always"   = fsync every write, zero data loss
durability = "standard"

# Payload codec: "json" (default) or "msgpack"
# Changing the codec of an existing store makes old records undecodable.
codec = "json"

# Sub-map names inside the ordered engine
data_map = "data"
index_map = "index"

# Rebuild the type index from the data on every open (default: false)
rebuild_index_on_open = false
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Storage(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| {
            StoreError::InvalidInput(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> StoreResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                StoreError::Storage(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StoreResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StoreError::Serialization(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            StoreError::Storage(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Load `recordstore.toml` from `dir`, creating the default if missing.
    ///
    /// The returned config always points at `dir`.
    pub fn load_dir(dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(CONFIG_FILE_NAME);
        Self::write_default_if_missing(&path)?;
        let mut config = Self::from_file(&path)?;
        config.path = Some(dir.to_path_buf());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordstore_core::Codec;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_standard_json_in_memory() {
        let config = StoreConfig::default();
        assert_eq!(config.path, None);
        assert_eq!(config.durability, "standard");
        assert_eq!(config.codec, "json");
        assert!(matches!(
            config.durability_mode().unwrap(),
            DurabilityMode::Batched { .. }
        ));
        config.validate().unwrap();
    }

    #[test]
    fn parse_always() {
        let config: StoreConfig = toml::from_str("durability = \"always\"").unwrap();
        assert_eq!(config.durability_mode().unwrap(), DurabilityMode::Strict);
    }

    #[test]
    fn parse_invalid_mode_returns_error() {
        let config: StoreConfig = toml::from_str("durability = \"turbo\"").unwrap();
        assert!(matches!(
            config.durability_mode(),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn parse_msgpack_codec() {
        let config: StoreConfig = toml::from_str("codec = \"msgpack\"").unwrap();
        assert_eq!(config.codec().unwrap().name(), "msgpack");
    }

    #[test]
    fn same_map_names_rejected() {
        let config: StoreConfig =
            toml::from_str("data_map = \"x\"\nindex_map = \"x\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config: StoreConfig = toml::from_str(StoreConfig::default_toml()).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        StoreConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config.durability, "standard");
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "codec = \"msgpack\"\n").unwrap();

        StoreConfig::write_default_if_missing(&path).unwrap();
        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config.codec, "msgpack");
    }

    #[test]
    fn from_file_rejects_bad_codec() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "codec = \"yaml\"\n").unwrap();
        assert!(matches!(
            StoreConfig::from_file(&path),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn write_to_file_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = StoreConfig {
            durability: "always".to_string(),
            rebuild_index_on_open: true,
            ..StoreConfig::default()
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(StoreConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn load_dir_points_at_dir() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::load_dir(dir.path()).unwrap();
        assert_eq!(config.path.as_deref(), Some(dir.path()));
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }
}
