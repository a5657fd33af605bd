//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce a `SyncConfig` ready for `Synchronizer::configure`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::{ConfigLoader, SyncConfig};
//! use std::path::Path;
//!
//! let config: SyncConfig = ConfigLoader::load_from_path(Path::new("sync.toml")).unwrap();
//! println!("lateness: {}", config.lateness);
//! ```

mod parser;
mod validator;

pub use contracts::SyncConfig;
pub use parser::ConfigFormat;

use contracts::{ContractError, StreamKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path<K>(path: &Path) -> Result<SyncConfig<K>, ContractError>
    where
        K: StreamKey + DeserializeOwned,
    {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str<K>(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SyncConfig<K>, ContractError>
    where
        K: StreamKey + DeserializeOwned,
    {
        Self::parse_and_validate(content, format)
    }

    /// Check an in-memory configuration with the same rules as file loading
    pub fn validate<K: StreamKey>(config: &SyncConfig<K>) -> Result<(), ContractError> {
        validator::validate(config)
    }

    /// Serialize SyncConfig to TOML string
    pub fn to_toml<K: Serialize>(config: &SyncConfig<K>) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize SyncConfig to JSON string
    pub fn to_json<K: Serialize>(config: &SyncConfig<K>) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate<K>(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SyncConfig<K>, ContractError>
    where
        K: StreamKey + DeserializeOwned,
    {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}
