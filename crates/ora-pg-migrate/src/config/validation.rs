//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Upper bound for `conversion.max_synonym_depth`.
const MAX_SYNONYM_DEPTH: usize = 64;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.input.registry.as_os_str().is_empty() {
        return Err(MigrateError::Config("input.registry is required".into()));
    }

    if let Some(path) = &config.output.path {
        if path.as_os_str().is_empty() {
            return Err(MigrateError::Config(
                "output.path must not be empty when set".into(),
            ));
        }
    }

    let conversion = &config.conversion;
    if conversion.default_column_type.trim().is_empty() {
        return Err(MigrateError::Config(
            "conversion.default_column_type is required".into(),
        ));
    }
    if conversion.max_synonym_depth == 0 || conversion.max_synonym_depth > MAX_SYNONYM_DEPTH {
        return Err(MigrateError::Config(format!(
            "conversion.max_synonym_depth must be between 1 and {}, got {}",
            MAX_SYNONYM_DEPTH, conversion.max_synonym_depth
        )));
    }
    if let Some(schemas) = &conversion.schemas {
        if schemas.is_empty() {
            return Err(MigrateError::Config(
                "conversion.schemas must list at least one schema when set".into(),
            ));
        }
        if schemas.iter().any(|s| s.trim().is_empty()) {
            return Err(MigrateError::Config(
                "conversion.schemas must not contain empty names".into(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConversionConfig, InputConfig, OutputConfig};
    use std::path::PathBuf;

    fn valid_config() -> Config {
        Config {
            input: InputConfig {
                registry: PathBuf::from("registry.json"),
            },
            output: OutputConfig::default(),
            conversion: ConversionConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_registry() {
        let mut config = valid_config();
        config.input.registry = PathBuf::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_synonym_depth() {
        let mut config = valid_config();
        config.conversion.max_synonym_depth = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_excessive_synonym_depth() {
        let mut config = valid_config();
        config.conversion.max_synonym_depth = 1000;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("max_synonym_depth"));
    }

    #[test]
    fn test_blank_default_type() {
        let mut config = valid_config();
        config.conversion.default_column_type = "  ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_schema_list() {
        let mut config = valid_config();
        config.conversion.schemas = Some(vec![]);
        assert!(validate(&config).is_err());
    }
}
