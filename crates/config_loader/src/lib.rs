//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Generate `PollerBlueprint`
//! - Load the tag address list (CSV file or inline list)
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("poller.toml")).unwrap();
//! println!("Workers: {}", blueprint.polling.workers);
//! ```

mod addresses;
mod parser;
mod validator;

pub use addresses::{address_source, CsvAddressFile, StaticAddressList};
pub use contracts::PollerBlueprint;
pub use parser::ConfigFormat;

use contracts::{ContractError, TagAddress};
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
    pub fn load_from_path(path: &Path) -> Result<PollerBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PollerBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate a blueprint that was modified after loading (e.g. CLI overrides)
    pub fn validate(blueprint: &PollerBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Load the address list described by the blueprint
    pub fn load_addresses(blueprint: &PollerBlueprint) -> Result<Vec<TagAddress>, ContractError> {
        address_source(&blueprint.addresses)?.load_addresses()
    }

    /// Serialize PollerBlueprint to TOML string
    pub fn to_toml(blueprint: &PollerBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize PollerBlueprint to JSON string
    pub fn to_json(blueprint: &PollerBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
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
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PollerBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[addresses]
tags = ["Motor1.Speed", "Motor1.Running", "Tank.Level"]

[polling]
workers = 2
batch_size = 2
period_ms = 250

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.polling.workers, 2);
        assert_eq!(ConfigLoader::load_addresses(&bp).unwrap().len(), 3);
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.polling.period_ms, bp2.polling.period_ms);
        assert_eq!(bp.sinks.len(), bp2.sinks.len());
        assert_eq!(bp.addresses.tags, bp2.addresses.tags);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.polling.batch_size, bp2.polling.batch_size);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[addresses]
tags = ["A"]

[polling]
workers = 0
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("workers"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = ConfigLoader::load_from_path(Path::new("poller.yaml")).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }
}
