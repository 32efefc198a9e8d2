//! Table strategies.
//!
//! Tables are created bare: constraints are added afterwards through the
//! constraint strategies so they can be applied in dependency order. Only
//! NOT NULL stays inline with the column.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::identifier::{pg_identifier, qualify};
use crate::model::{ColumnMetadata, TableMetadata};
use crate::plpgsql::rewrite_outside_literals;
use crate::typemap;

use super::{Strategy, StrategyRegistry, TransformContext};

/// Oracle spellings rewritten inside column defaults.
static DEFAULT_REWRITES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\b(SYSTIMESTAMP|SYSDATE)\b", "CURRENT_TIMESTAMP"),
        (r"(?i)\bUSER\b", "CURRENT_USER"),
        (r"(?i)\bSYS_GUID\s*\(\s*\)", "gen_random_uuid()"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("default rewrite pattern is valid"),
            replacement,
        )
    })
    .collect()
});

pub trait TableStrategy: Strategy {
    fn supports(&self, table: &TableMetadata) -> bool;

    /// `CREATE TABLE` statement for the table.
    fn transform(&self, table: &TableMetadata, ctx: &TransformContext<'_>) -> Result<String>;

    fn conversion_notes(&self, table: &TableMetadata) -> String;
}

pub type TableRegistry = StrategyRegistry<dyn TableStrategy>;

impl StrategyRegistry<dyn TableStrategy> {
    /// Registry with the standard strategy as catch-all.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new("table");
        registry.register(Box::new(StandardTableStrategy));
        registry
    }

    pub fn select(&self, table: &TableMetadata) -> Option<&dyn TableStrategy> {
        self.select_where(|s| s.supports(table))
    }

    pub fn transform(&self, table: &TableMetadata, ctx: &TransformContext<'_>) -> Result<String> {
        self.apply(
            &table.full_name(),
            |s| s.supports(table),
            |s| s.transform(table, ctx),
        )
    }

    pub fn conversion_notes(&self, table: &TableMetadata) -> Option<String> {
        self.select(table).map(|s| s.conversion_notes(table))
    }
}

/// Column definitions with mapped types, defaults and NOT NULL.
pub struct StandardTableStrategy;

impl Strategy for StandardTableStrategy {
    fn name(&self) -> &'static str {
        "Standard Table"
    }
}

impl TableStrategy for StandardTableStrategy {
    fn supports(&self, _table: &TableMetadata) -> bool {
        true
    }

    fn transform(&self, table: &TableMetadata, _ctx: &TransformContext<'_>) -> Result<String> {
        debug!("Transforming table {} ({} columns)", table.full_name(), table.columns.len());
        if table.columns.is_empty() {
            return Err(MigrateError::unsupported(
                table.full_name(),
                "table has no columns",
            ));
        }

        let columns: Vec<String> = table.columns.iter().map(column_definition).collect();
        Ok(format!(
            "CREATE TABLE {} (\n{}\n);",
            qualify(&table.schema, &table.name),
            columns.join(",\n")
        ))
    }

    fn conversion_notes(&self, _table: &TableMetadata) -> String {
        "Converted using standard table transformation".to_string()
    }
}

fn column_definition(column: &ColumnMetadata) -> String {
    let mut def = format!(
        "  {} {}",
        pg_identifier(&column.name),
        typemap::column_to_postgres(&column.data_type, column.length, column.precision, column.scale)
    );
    if let Some(default) = column.default_value.as_deref().map(str::trim) {
        if !default.is_empty() {
            def.push_str(" DEFAULT ");
            def.push_str(&transform_default(default));
        }
    }
    if !column.nullable {
        def.push_str(" NOT NULL");
    }
    def
}

/// Rewrite an Oracle column default for PostgreSQL.
pub fn transform_default(value: &str) -> String {
    rewrite_outside_literals(value, |text| {
        DEFAULT_REWRITES
            .iter()
            .fold(text.to_string(), |acc, (pattern, replacement)| {
                pattern.replace_all(&acc, *replacement).into_owned()
            })
    })
}
