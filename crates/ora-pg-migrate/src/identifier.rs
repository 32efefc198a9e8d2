//! PostgreSQL identifier rendering and validation.
//!
//! Oracle stores unquoted names in uppercase; PostgreSQL folds unquoted names
//! to lowercase. Generated DDL therefore lowercases every Oracle name and only
//! adds double quotes where PostgreSQL requires them (reserved words, leading
//! digits, characters outside `[a-z0-9_$]`). Names that reach this module come
//! from the source dictionary and are validated before they are embedded.

use sha2::{Digest, Sha256};

use crate::error::{MigrateError, Result};

/// PostgreSQL limit on identifier length in bytes.
pub const PG_MAX_IDENTIFIER_LENGTH: usize = 63;

/// Length of the readable prefix kept when a name is shortened.
const TRUNCATED_PREFIX_LENGTH: usize = 55;

/// Number of hash characters appended to a shortened name.
const TRUNCATED_HASH_LENGTH: usize = 7;

/// Upper bound for any name read from the dictionary.
const MAX_SOURCE_IDENTIFIER_LENGTH: usize = 128;

/// Keywords PostgreSQL reserves (cannot be used as unquoted identifiers).
const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "binary", "both", "case", "cast", "check", "collate", "collation",
    "column", "concurrently", "constraint", "create", "cross", "current_catalog",
    "current_date", "current_role", "current_schema", "current_time", "current_timestamp",
    "current_user", "default", "deferrable", "desc", "distinct", "do", "else", "end",
    "except", "false", "fetch", "for", "foreign", "freeze", "from", "full", "grant",
    "group", "having", "ilike", "in", "initially", "inner", "intersect", "into", "is",
    "isnull", "join", "key", "lateral", "leading", "left", "like", "limit", "localtime",
    "localtimestamp", "natural", "not", "notnull", "null", "offset", "on", "only", "or",
    "order", "outer", "overlaps", "placing", "primary", "references", "returning", "right",
    "select", "session_user", "similar", "some", "symmetric", "system_user", "table",
    "tablesample", "then", "to", "trailing", "true", "union", "unique", "user", "using",
    "variadic", "verbose", "when", "where", "window", "with", "index",
];

/// Validate a dictionary name before it is embedded in DDL.
///
/// Rejects empty names, names containing null bytes and names longer than
/// any Oracle release allows.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(MigrateError::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::InvalidIdentifier(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_SOURCE_IDENTIFIER_LENGTH {
        return Err(MigrateError::InvalidIdentifier(format!(
            "identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_SOURCE_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Whether `word` is a PostgreSQL reserved keyword.
pub fn is_reserved_word(word: &str) -> bool {
    let lower = word.trim().to_lowercase();
    !lower.is_empty() && RESERVED_WORDS.contains(&lower.as_str())
}

/// Render an Oracle name as a PostgreSQL identifier.
///
/// The name is lowercased and quoted only when required.
///
/// ```ignore
/// assert_eq!(pg_identifier("EMPLOYEES"), "employees");
/// assert_eq!(pg_identifier("ORDER"), "\"order\"");
/// assert_eq!(pg_identifier("1ST"), "\"1st\"");
/// ```
pub fn pg_identifier(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let plain = lower
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && lower
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$');

    if plain && !is_reserved_word(&lower) {
        lower
    } else {
        format!("\"{}\"", lower.replace('"', "\"\""))
    }
}

/// Quote a PostgreSQL identifier unconditionally, preserving case.
///
/// Escapes double quotes by doubling them and wraps in double quotes.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a name with its schema: `schema.name`.
pub fn qualify(schema: &str, name: &str) -> String {
    if schema.trim().is_empty() {
        pg_identifier(name)
    } else {
        format!("{}.{}", pg_identifier(schema), pg_identifier(name))
    }
}

/// Shorten a name to PostgreSQL's 63-byte limit.
///
/// Names within the limit are returned unchanged. Longer names keep their
/// first 55 characters, followed by `_` and 7 hex characters of the SHA-256
/// digest of the full name, so distinct long names stay distinct.
pub fn truncate_pg_name(name: &str) -> String {
    if name.len() <= PG_MAX_IDENTIFIER_LENGTH {
        return name.to_string();
    }

    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    let prefix: String = name.chars().take(TRUNCATED_PREFIX_LENGTH).collect();
    format!("{}_{}", prefix, &digest[..TRUNCATED_HASH_LENGTH])
}

/// Validate a check condition read from the dictionary.
///
/// Check conditions should be simple boolean expressions. Statement
/// separators, comments and dynamic SQL are rejected.
pub fn validate_check_condition(condition: &str) -> Result<()> {
    if condition.contains(';') {
        return Err(MigrateError::InvalidIdentifier(format!(
            "check condition contains semicolon: {:?}",
            condition
        )));
    }

    if condition.contains("--") || condition.contains("/*") || condition.contains("*/") {
        return Err(MigrateError::InvalidIdentifier(format!(
            "check condition contains SQL comment markers: {:?}",
            condition
        )));
    }

    let lower = condition.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    if words
        .windows(2)
        .any(|w| w[0] == "execute" && w[1].starts_with("immediate"))
    {
        return Err(MigrateError::InvalidIdentifier(format!(
            "check condition contains dynamic SQL: {:?}",
            condition
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("EMPLOYEES").is_ok());
        assert!(validate_identifier("my_table").is_ok());
        assert!(validate_identifier("TABLE$1").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        let result = validate_identifier("");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let result = validate_identifier("table\0name");
        assert!(result.unwrap_err().to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_rejects_too_long() {
        let long_name = "A".repeat(MAX_SOURCE_IDENTIFIER_LENGTH + 1);
        let result = validate_identifier(&long_name);
        assert!(result.unwrap_err().to_string().contains("maximum length"));
    }

    // =========================================================================
    // Rendering tests
    // =========================================================================

    #[test]
    fn test_reserved_words() {
        assert!(is_reserved_word("select"));
        assert!(is_reserved_word("END"));
        assert!(is_reserved_word("Order"));
        assert!(!is_reserved_word("employee"));
        assert!(!is_reserved_word(""));
        assert!(!is_reserved_word("   "));
    }

    #[test]
    fn test_pg_identifier_lowercases_plain_names() {
        assert_eq!(pg_identifier("EMPLOYEES"), "employees");
        assert_eq!(pg_identifier("First_Name"), "first_name");
        assert_eq!(pg_identifier("ABC123"), "abc123");
    }

    #[test]
    fn test_pg_identifier_quotes_when_required() {
        assert_eq!(pg_identifier("ORDER"), "\"order\"");
        assert_eq!(pg_identifier("123TABLE"), "\"123table\"");
        assert_eq!(pg_identifier("MY TABLE"), "\"my table\"");
        assert_eq!(pg_identifier("A\"B"), "\"a\"\"b\"");
    }

    #[test]
    fn test_quote_pg_preserves_case() {
        assert_eq!(quote_pg("Users").unwrap(), "\"Users\"");
        assert_eq!(quote_pg("table\"name").unwrap(), "\"table\"\"name\"");
        assert!(quote_pg("").is_err());
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("HR", "EMPLOYEES"), "hr.employees");
        assert_eq!(qualify("", "EMPLOYEES"), "employees");
        assert_eq!(qualify("HR", "USER"), "hr.\"user\"");
    }

    #[test]
    fn test_truncate_short_name_unchanged() {
        assert_eq!(truncate_pg_name("ix_emp_name"), "ix_emp_name");
        let exact = "a".repeat(PG_MAX_IDENTIFIER_LENGTH);
        assert_eq!(truncate_pg_name(&exact), exact);
    }

    #[test]
    fn test_truncate_long_name_is_stable_and_distinct() {
        let a = format!("{}_a", "x".repeat(70));
        let b = format!("{}_b", "x".repeat(70));
        let ta = truncate_pg_name(&a);
        assert_eq!(ta.len(), TRUNCATED_PREFIX_LENGTH + 1 + TRUNCATED_HASH_LENGTH);
        assert!(ta.len() <= PG_MAX_IDENTIFIER_LENGTH);
        assert_eq!(ta, truncate_pg_name(&a));
        assert_ne!(ta, truncate_pg_name(&b));
    }

    // =========================================================================
    // Check condition tests
    // =========================================================================

    #[test]
    fn test_check_condition_valid() {
        assert!(validate_check_condition("SALARY > 0").is_ok());
        assert!(validate_check_condition("STATUS IN ('A', 'I')").is_ok());
    }

    #[test]
    fn test_check_condition_rejects_injection() {
        assert!(validate_check_condition("1=1; DROP TABLE T").is_err());
        assert!(validate_check_condition("1=1 -- x").is_err());
        assert!(validate_check_condition("execute immediate 'x'").is_err());
    }
}
