//! Error types for the conversion library.

use thiserror::Error;

/// Main error type for resolution and conversion operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A named reference matched zero or several candidates where exactly one is required
    #[error("Ambiguous reference {schema}.{name}: {message}")]
    AmbiguousReference {
        name: String,
        schema: String,
        message: String,
    },

    /// No registered strategy accepts the input
    #[error("No {kind} strategy found for {input}")]
    MissingStrategy { kind: &'static str, input: String },

    /// The construct has no PostgreSQL equivalent
    #[error("Unsupported construct {input}: {reason}")]
    UnsupportedConstruct { input: String, reason: String },

    /// A foreign key references a table that is not part of the migration
    #[error("Dependency validation failed for {constraint}: referenced table {referenced} does not exist")]
    DependencyValidation {
        constraint: String,
        referenced: String,
    },

    /// Synonym chain followed deeper than allowed
    #[error("Recursion limit of {depth} reached while resolving {name}")]
    RecursionLimit { name: String, depth: usize },

    /// A strategy failed while transforming an input
    #[error("Failed to transform {kind} {input} using strategy '{strategy}'")]
    StrategyFailed {
        kind: &'static str,
        input: String,
        strategy: String,
        #[source]
        source: Box<MigrateError>,
    },

    /// Expression text could not be parsed into a reference or call chain
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// A dictionary name or condition is unsafe to embed in DDL
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create an AmbiguousReference error
    pub fn ambiguous(
        name: impl Into<String>,
        schema: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MigrateError::AmbiguousReference {
            name: name.into(),
            schema: schema.into(),
            message: message.into(),
        }
    }

    /// Create a MissingStrategy error
    pub fn missing_strategy(kind: &'static str, input: impl Into<String>) -> Self {
        MigrateError::MissingStrategy {
            kind,
            input: input.into(),
        }
    }

    /// Create an UnsupportedConstruct error
    pub fn unsupported(input: impl Into<String>, reason: impl Into<String>) -> Self {
        MigrateError::UnsupportedConstruct {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a DependencyValidation error
    pub fn dependency(constraint: impl Into<String>, referenced: impl Into<String>) -> Self {
        MigrateError::DependencyValidation {
            constraint: constraint.into(),
            referenced: referenced.into(),
        }
    }

    /// Wrap a failure raised inside a strategy with the input and strategy identity
    pub fn strategy_failed(
        kind: &'static str,
        input: impl Into<String>,
        strategy: impl Into<String>,
        source: MigrateError,
    ) -> Self {
        MigrateError::StrategyFailed {
            kind,
            input: input.into(),
            strategy: strategy.into(),
            source: Box::new(source),
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::Io(_) | MigrateError::Json(_) => 3,
            MigrateError::AmbiguousReference { .. } | MigrateError::InvalidExpression(_) => 4,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detailed_includes_cause() {
        let inner = MigrateError::dependency("FK_EMP_DEPT", "HR.DEPT");
        let err = MigrateError::strategy_failed("constraint", "FK_EMP_DEPT", "Foreign Key", inner);
        let detailed = err.format_detailed();
        assert!(detailed.contains("Failed to transform constraint FK_EMP_DEPT"));
        assert!(detailed.contains("Caused by:"));
        assert!(detailed.contains("HR.DEPT does not exist"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), 2);
        assert_eq!(MigrateError::ambiguous("A", "B", "c").exit_code(), 4);
        assert_eq!(MigrateError::missing_strategy("view", "V").exit_code(), 1);
    }
}
