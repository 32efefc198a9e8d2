//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the extracted schema snapshot comes from.
    pub input: InputConfig,

    /// Where and how the generated SQL is written.
    #[serde(default)]
    pub output: OutputConfig,

    /// Conversion behavior.
    #[serde(default)]
    pub conversion: ConversionConfig,
}

/// Input snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Path to the JSON registry snapshot produced by extraction.
    pub registry: PathBuf,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output file. Standard output is used when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Emit descriptive header comments before constraints and indexes (default: true).
    #[serde(default = "default_true")]
    pub include_comments: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            include_comments: true,
        }
    }
}

/// Conversion behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Type reported when a column or expression type cannot be resolved (default: "varchar2").
    #[serde(default = "default_column_type")]
    pub default_column_type: String,

    /// Maximum synonym chain length followed before giving up (default: 10).
    #[serde(default = "default_synonym_depth")]
    pub max_synonym_depth: usize,

    /// Tablespaces that are dropped from index DDL (default: USERS, SYSTEM).
    #[serde(default = "default_skip_tablespaces")]
    pub skip_tablespaces: Vec<String>,

    /// Emit placeholder views before routines so dependents compile (default: true).
    #[serde(default = "default_true")]
    pub view_placeholders: bool,

    /// Emit stub bodies for functions and procedures (default: false).
    #[serde(default)]
    pub spec_only: bool,

    /// Restrict conversion to these schemas. All schemas when absent.
    #[serde(default)]
    pub schemas: Option<Vec<String>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            default_column_type: default_column_type(),
            max_synonym_depth: default_synonym_depth(),
            skip_tablespaces: default_skip_tablespaces(),
            view_placeholders: true,
            spec_only: false,
            schemas: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_column_type() -> String {
    "varchar2".to_string()
}

fn default_synonym_depth() -> usize {
    10
}

fn default_skip_tablespaces() -> Vec<String> {
    vec!["USERS".to_string(), "SYSTEM".to_string()]
}
