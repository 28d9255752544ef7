//! Address list sources
//!
//! The address list is either an inline list from the configuration or a CSV
//! file whose first column holds one address per row.

use std::path::{Path, PathBuf};

use contracts::{AddressConfig, AddressSource, ContractError, TagAddress};
use tracing::debug;

/// Addresses read from the first column of a CSV file
#[derive(Debug, Clone)]
pub struct CsvAddressFile {
    path: PathBuf,
}

impl CsvAddressFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse CSV content, taking the first field of every non-blank, non-comment row
    pub fn parse(content: &str) -> Vec<TagAddress> {
        content
            .lines()
            .map(|line| line.trim_start_matches('\u{feff}').trim())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let first = line.split(',').next().unwrap_or_default().trim();
                let first = first.trim_matches('"').trim();
                (!first.is_empty()).then(|| TagAddress::from(first))
            })
            .collect()
    }
}

impl AddressSource for CsvAddressFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load_addresses(&self) -> Result<Vec<TagAddress>, ContractError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            ContractError::config_validation(
                "addresses.file",
                format!("cannot read '{}': {e}", self.path.display()),
            )
        })?;

        let addresses = Self::parse(&content);
        if addresses.is_empty() {
            return Err(ContractError::config_validation(
                "addresses.file",
                format!("no addresses found in '{}'", self.path.display()),
            ));
        }

        debug!(path = %self.path.display(), count = addresses.len(), "address file loaded");
        Ok(addresses)
    }
}

/// Inline address list from the configuration
#[derive(Debug, Clone, Default)]
pub struct StaticAddressList {
    tags: Vec<String>,
}

impl StaticAddressList {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

impl AddressSource for StaticAddressList {
    fn describe(&self) -> String {
        format!("inline ({} tags)", self.tags.len())
    }

    fn load_addresses(&self) -> Result<Vec<TagAddress>, ContractError> {
        if self.tags.is_empty() {
            return Err(ContractError::config_validation(
                "addresses.tags",
                "address list cannot be empty",
            ));
        }
        Ok(self.tags.iter().map(|t| TagAddress::from(t.trim())).collect())
    }
}

/// Build the address source described by the configuration
pub fn address_source(config: &AddressConfig) -> Result<Box<dyn AddressSource>, ContractError> {
    match (&config.file, &config.tags) {
        (Some(path), None) => Ok(Box::new(CsvAddressFile::new(path))),
        (None, Some(tags)) => Ok(Box::new(StaticAddressList::new(tags.iter().cloned()))),
        _ => Err(ContractError::config_validation(
            "addresses",
            "exactly one of addresses.file or addresses.tags is required",
        )),
    }
}
