//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration.
    ///
    /// The hash is written into the generated script header so two scripts
    /// can be traced back to the settings that produced them.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl ConversionConfig {
    /// Whether objects in `schema` take part in the conversion.
    pub fn includes_schema(&self, schema: &str) -> bool {
        match &self.schemas {
            Some(allowed) => allowed.iter().any(|s| s.eq_ignore_ascii_case(schema)),
            None => true,
        }
    }

    /// Whether a tablespace clause should be dropped from index DDL.
    pub fn skips_tablespace(&self, tablespace: &str) -> bool {
        self.skip_tablespaces
            .iter()
            .any(|t| t.eq_ignore_ascii_case(tablespace))
    }
}
