//! Index strategies.
//!
//! Oracle indexes map onto PostgreSQL B-tree indexes when they are plain,
//! valid and column based. Everything else (bitmap, function-based, reverse
//! key, domain, cluster, partitioned, unusable) is reported with a reason and
//! a suggested manual action instead of DDL.
//!
//! Index DDL runs after data transfer, so every [`PostgresIndexDdl`] carries
//! the `POST_TRANSFER_INDEXES` execution phase.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::ConversionConfig;
use crate::error::Result;
use crate::identifier::{pg_identifier, qualify, truncate_pg_name, PG_MAX_IDENTIFIER_LENGTH};
use crate::model::{IndexColumn, IndexMetadata};
use crate::ordering::filter_conflicting_indexes;

use super::{Strategy, StrategyRegistry, TransformContext};

/// Execution phase of every generated index statement.
pub const POST_TRANSFER_INDEXES: &str = "POST_TRANSFER_INDEXES";

/// PostgreSQL's limit on key columns per index.
pub const MAX_INDEX_COLUMNS: usize = 32;

/// Strategy name counted for indexes dropped because a constraint already creates them.
const CONSTRAINT_CONFLICT: &str = "Constraint Conflict";

/// Strategy name counted for indexes whose conversion returned an error.
const CONVERSION_ERROR: &str = "Error";

pub trait IndexStrategy: Strategy {
    fn supports(&self, index: &IndexMetadata) -> bool;

    /// Convert one index. Unsupported indexes yield a DDL without SQL.
    fn convert(&self, index: &IndexMetadata, ctx: &TransformContext<'_>) -> Result<PostgresIndexDdl>;

    /// Whether this strategy produces executable SQL.
    fn generates_ddl(&self) -> bool {
        true
    }

    fn conversion_notes(&self, index: &IndexMetadata, options: &ConversionConfig) -> String;
}

pub type IndexRegistry = StrategyRegistry<dyn IndexStrategy>;

impl StrategyRegistry<dyn IndexStrategy> {
    /// Unique, composite and B-tree strategies with the unsupported strategy as catch-all.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new("index");
        registry.register(Box::new(UniqueIndexStrategy));
        registry.register(Box::new(CompositeIndexStrategy));
        registry.register(Box::new(BTreeIndexStrategy));
        registry.register(Box::new(UnsupportedIndexStrategy));
        registry
    }

    pub fn select(&self, index: &IndexMetadata) -> Option<&dyn IndexStrategy> {
        self.select_where(|s| s.supports(index))
    }

    pub fn convert(&self, index: &IndexMetadata, ctx: &TransformContext<'_>) -> Result<PostgresIndexDdl> {
        self.apply(&index.full_name(), |s| s.supports(index), |s| s.convert(index, ctx))
    }

    pub fn conversion_notes(&self, index: &IndexMetadata, options: &ConversionConfig) -> Option<String> {
        self.select(index).map(|s| s.conversion_notes(index, options))
    }

    /// Convert every index, skipping those that duplicate a primary key or
    /// unique constraint index.
    pub fn convert_all(&self, indexes: &[IndexMetadata], ctx: &TransformContext<'_>) -> IndexConversionResult {
        let mut result = IndexConversionResult::default();

        let candidates = filter_conflicting_indexes(indexes, ctx.registry());
        let conflicting = indexes.len() - candidates.len();
        if conflicting > 0 {
            info!(
                "Skipped {} indexes that duplicate constraint-generated indexes",
                conflicting
            );
            result.conflicting = conflicting;
            result
                .strategy_usage
                .insert(CONSTRAINT_CONFLICT.to_string(), conflicting);
        }

        for index in candidates {
            let strategy_name = self.select(index).map_or(CONVERSION_ERROR, |s| s.name());
            match self.convert(index, ctx) {
                Ok(ddl) => {
                    *result.strategy_usage.entry(strategy_name.to_string()).or_default() += 1;
                    if ddl.is_supported() {
                        result.supported.push(ddl);
                    } else {
                        result.unsupported.push(ddl);
                    }
                }
                Err(e) => {
                    warn!("Failed to convert index {}: {}", index.full_name(), e);
                    *result
                        .strategy_usage
                        .entry(CONVERSION_ERROR.to_string())
                        .or_default() += 1;
                    result.unsupported.push(PostgresIndexDdl::unsupported(
                        index,
                        format!("Conversion failed: {}", e),
                        None,
                    ));
                }
            }
        }

        info!("{}", result.summary());
        result
    }
}

/// Converted (or rejected) index.
#[derive(Debug, Clone, PartialEq)]
pub struct PostgresIndexDdl {
    /// `CREATE INDEX` statement, absent for unsupported indexes.
    pub create_sql: Option<String>,
    /// PostgreSQL index name.
    pub index_name: Option<String>,
    pub original_name: String,
    pub schema: String,
    pub table: String,
    pub execution_phase: Option<&'static str>,
    pub notes: String,
    pub suggested_action: Option<String>,
    pub dependencies: Vec<String>,
}

impl PostgresIndexDdl {
    fn supported(index: &IndexMetadata, index_name: String, create_sql: String, notes: String) -> Self {
        Self {
            create_sql: Some(create_sql),
            index_name: Some(index_name),
            original_name: index.name.clone(),
            schema: index.schema.clone(),
            table: index.table.clone(),
            execution_phase: Some(POST_TRANSFER_INDEXES),
            notes,
            suggested_action: None,
            dependencies: vec![index.table.clone()],
        }
    }

    fn unsupported(index: &IndexMetadata, reason: String, suggested_action: Option<String>) -> Self {
        Self {
            create_sql: None,
            index_name: None,
            original_name: index.name.clone(),
            schema: index.schema.clone(),
            table: index.table.clone(),
            execution_phase: None,
            notes: reason,
            suggested_action,
            dependencies: Vec::new(),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.create_sql.is_some()
    }

    pub fn is_executable(&self) -> bool {
        self.create_sql
            .as_deref()
            .is_some_and(|sql| !sql.trim().is_empty())
    }

    /// One-line status, e.g. `✓ IX_EMP → ix_emp (Converted)`.
    pub fn summary(&self) -> String {
        match &self.index_name {
            Some(name) if self.is_supported() => {
                format!("✓ {} → {} (Converted)", self.original_name, name)
            }
            _ => format!("✗ {} ({})", self.original_name, self.notes),
        }
    }

    /// SQL with a header comment, or a comment explaining why no SQL was produced.
    pub fn formatted_sql(&self) -> String {
        match &self.create_sql {
            Some(sql) if self.is_executable() => {
                format!("-- Index: {} ({})\n{};", self.original_name, self.notes, sql)
            }
            _ => format!(
                "-- Index not converted: {} ({})",
                self.original_name, self.notes
            ),
        }
    }

    /// Block for the unsupported-index report.
    pub fn report_entry(&self) -> String {
        let mut entry = format!(
            "UNSUPPORTED INDEX: {}.{}\nTable: {}\nReason: {}\n",
            self.schema, self.original_name, self.table, self.notes
        );
        if let Some(action) = &self.suggested_action {
            entry.push_str(&format!("Suggested Action: {}\n", action));
        }
        entry.push_str("---\n");
        entry
    }
}

/// Outcome of converting a batch of indexes.
#[derive(Debug, Clone, Default)]
pub struct IndexConversionResult {
    pub supported: Vec<PostgresIndexDdl>,
    pub unsupported: Vec<PostgresIndexDdl>,
    /// Indexes handled per strategy name.
    pub strategy_usage: BTreeMap<String, usize>,
    /// Indexes skipped because a constraint already creates them.
    pub conflicting: usize,
}

impl IndexConversionResult {
    pub fn total(&self) -> usize {
        self.supported.len() + self.unsupported.len()
    }

    pub fn supported_count(&self) -> usize {
        self.supported.len()
    }

    pub fn unsupported_count(&self) -> usize {
        self.unsupported.len()
    }

    pub fn supported_percentage(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.supported.len() as f64 * 100.0 / self.total() as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "Index Conversion: {} total, {} supported ({:.1}%), {} unsupported",
            self.total(),
            self.supported_count(),
            self.supported_percentage(),
            self.unsupported_count()
        )
    }

    /// Report listing every unsupported index.
    pub fn unsupported_report(&self) -> String {
        let mut report = String::from("-- Unsupported indexes\n");
        if self.unsupported.is_empty() {
            report.push_str("-- none\n");
            return report;
        }
        for ddl in &self.unsupported {
            report.push_str(&ddl.report_entry());
        }
        report
    }
}

/// Plain, valid, non-partitioned column index within PostgreSQL's column limit.
fn is_plain(index: &IndexMetadata) -> bool {
    index.is_normal()
        && index.is_valid()
        && !index.partitioned
        && !index.is_functional()
        && !index.columns.is_empty()
        && index.columns.len() <= MAX_INDEX_COLUMNS
}

fn ordered_columns(index: &IndexMetadata) -> Vec<&IndexColumn> {
    let mut columns: Vec<&IndexColumn> = index.columns.iter().collect();
    columns.sort_by_key(|c| c.position);
    columns
}

fn descending_count(index: &IndexMetadata) -> usize {
    index.columns.iter().filter(|c| c.descending).count()
}

fn pg_index_name(index: &IndexMetadata) -> String {
    pg_identifier(&truncate_pg_name(&index.name.to_lowercase()))
}

fn is_truncated(index: &IndexMetadata) -> bool {
    index.name.len() > PG_MAX_IDENTIFIER_LENGTH
}

fn custom_tablespace<'i>(index: &'i IndexMetadata, options: &ConversionConfig) -> Option<&'i str> {
    index
        .tablespace
        .as_deref()
        .map(str::trim)
        .filter(|ts| !ts.is_empty() && !options.skips_tablespace(ts))
}

/// `CREATE [UNIQUE ]INDEX name ON schema.table (cols)[ TABLESPACE ts]`
fn create_index_sql(index: &IndexMetadata, options: &ConversionConfig) -> String {
    let columns: Vec<String> = ordered_columns(index)
        .into_iter()
        .map(|c| {
            if c.descending {
                format!("{} DESC", pg_identifier(&c.name))
            } else {
                pg_identifier(&c.name)
            }
        })
        .collect();

    let mut sql = format!(
        "CREATE {}INDEX {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        pg_index_name(index),
        qualify(&index.schema, &index.table),
        columns.join(", ")
    );
    if let Some(ts) = custom_tablespace(index, options) {
        sql.push_str(" TABLESPACE ");
        sql.push_str(&pg_identifier(ts));
    }
    sql
}

fn supported_ddl(index: &IndexMetadata, options: &ConversionConfig, notes: String) -> PostgresIndexDdl {
    let name = pg_index_name(index);
    debug!("Index {} converted as {}", index.full_name(), name);
    PostgresIndexDdl::supported(index, name, create_index_sql(index, options), notes)
}

/// Notes shared by every supported index: descending columns, truncation, tablespace.
fn common_notes(index: &IndexMetadata, options: &ConversionConfig, notes: &mut Vec<String>) {
    let descending = descending_count(index);
    if descending > 0 {
        notes.push(format!("{} descending column(s)", descending));
    }
    if is_truncated(index) {
        notes.push("Name truncated due to PostgreSQL 63-char limit".to_string());
    }
    if let Some(ts) = custom_tablespace(index, options) {
        notes.push(format!("Custom tablespace: {}", ts));
    }
}

/// Unique B-tree index.
pub struct UniqueIndexStrategy;

impl Strategy for UniqueIndexStrategy {
    fn name(&self) -> &'static str {
        "Unique Index"
    }

    fn priority(&self) -> i32 {
        20
    }
}

impl IndexStrategy for UniqueIndexStrategy {
    fn supports(&self, index: &IndexMetadata) -> bool {
        is_plain(index) && index.unique
    }

    fn convert(&self, index: &IndexMetadata, ctx: &TransformContext<'_>) -> Result<PostgresIndexDdl> {
        let notes = self.conversion_notes(index, ctx.options);
        Ok(supported_ddl(index, ctx.options, notes))
    }

    fn conversion_notes(&self, index: &IndexMetadata, options: &ConversionConfig) -> String {
        let mut notes = vec![if index.is_composite() {
            format!("Composite unique index with {} columns", index.columns.len())
        } else {
            "Single-column unique index".to_string()
        }];
        common_notes(index, options, &mut notes);
        notes.push("Enforces uniqueness constraint".to_string());
        notes.join("; ")
    }
}

/// Non-unique index over several columns.
pub struct CompositeIndexStrategy;

impl Strategy for CompositeIndexStrategy {
    fn name(&self) -> &'static str {
        "Composite Index"
    }

    fn priority(&self) -> i32 {
        15
    }
}

impl IndexStrategy for CompositeIndexStrategy {
    fn supports(&self, index: &IndexMetadata) -> bool {
        is_plain(index) && index.is_composite()
    }

    fn convert(&self, index: &IndexMetadata, ctx: &TransformContext<'_>) -> Result<PostgresIndexDdl> {
        let notes = self.conversion_notes(index, ctx.options);
        Ok(supported_ddl(index, ctx.options, notes))
    }

    fn conversion_notes(&self, index: &IndexMetadata, options: &ConversionConfig) -> String {
        let count = index.columns.len();
        let mut notes = vec![if count <= 5 {
            let names: Vec<String> = index
                .column_names()
                .into_iter()
                .map(pg_identifier)
                .collect();
            format!("Composite index with {} columns ({})", count, names.join(", "))
        } else {
            format!("Composite index with {} columns", count)
        }];

        let descending = descending_count(index);
        if descending > 0 && descending < count {
            notes.push("Mixed sort orders".to_string());
        }
        common_notes(index, options, &mut notes);
        notes.join("; ")
    }
}

/// Non-unique single-column index.
pub struct BTreeIndexStrategy;

impl Strategy for BTreeIndexStrategy {
    fn name(&self) -> &'static str {
        "B-Tree Index"
    }

    fn priority(&self) -> i32 {
        10
    }
}

impl IndexStrategy for BTreeIndexStrategy {
    fn supports(&self, index: &IndexMetadata) -> bool {
        is_plain(index) && !index.unique
    }

    fn convert(&self, index: &IndexMetadata, ctx: &TransformContext<'_>) -> Result<PostgresIndexDdl> {
        let notes = self.conversion_notes(index, ctx.options);
        Ok(supported_ddl(index, ctx.options, notes))
    }

    fn conversion_notes(&self, index: &IndexMetadata, options: &ConversionConfig) -> String {
        let mut notes = vec!["Single-column B-tree index".to_string()];
        common_notes(index, options, &mut notes);
        notes.join("; ")
    }
}

/// Catch-all: explains why the index cannot be converted.
pub struct UnsupportedIndexStrategy;

impl UnsupportedIndexStrategy {
    /// First matching reason, most specific first.
    pub fn reason(&self, index: &IndexMetadata) -> String {
        let index_type = index.index_type.to_uppercase();
        if index.is_bitmap() {
            "Bitmap indexes not supported in PostgreSQL - consider B-tree alternative".to_string()
        } else if index.is_functional() {
            "Function-based indexes require manual conversion of expressions".to_string()
        } else if !index.is_valid() {
            format!("Index status is {} - only VALID indexes are migrated", index.status)
        } else if index.columns.is_empty() {
            "Index has no columns defined".to_string()
        } else if index_type == "NORMAL/REV" {
            "Reverse key indexes not supported in PostgreSQL".to_string()
        } else if index_type.contains("DOMAIN") {
            "Domain indexes require manual conversion".to_string()
        } else if index_type.contains("CLUSTER") {
            "Cluster indexes not supported in PostgreSQL".to_string()
        } else if index.partitioned {
            "Partitioned indexes require manual conversion".to_string()
        } else if index.columns.len() > MAX_INDEX_COLUMNS {
            format!(
                "Too many columns ({}) - PostgreSQL limit is 32",
                index.columns.len()
            )
        } else {
            format!("Unsupported index type: {}", index.index_type)
        }
    }

    pub fn suggested_action(&self, index: &IndexMetadata) -> String {
        if index.is_bitmap() {
            let columns: Vec<String> = index
                .column_names()
                .into_iter()
                .map(pg_identifier)
                .collect();
            format!(
                "Create B-tree index: CREATE INDEX {} ON {} ({});",
                pg_index_name(index),
                qualify(&index.schema, &index.table),
                columns.join(", ")
            )
        } else if index.is_functional() {
            "Review expressions and create functional index with PostgreSQL-compatible functions"
                .to_string()
        } else {
            "Review index requirements and create appropriate PostgreSQL equivalent".to_string()
        }
    }
}

impl Strategy for UnsupportedIndexStrategy {
    fn name(&self) -> &'static str {
        "Unsupported Index"
    }

    fn priority(&self) -> i32 {
        -1
    }
}

impl IndexStrategy for UnsupportedIndexStrategy {
    fn supports(&self, _index: &IndexMetadata) -> bool {
        true
    }

    fn convert(&self, index: &IndexMetadata, _ctx: &TransformContext<'_>) -> Result<PostgresIndexDdl> {
        let reason = self.reason(index);
        warn!("Index {} not converted: {}", index.full_name(), reason);
        Ok(PostgresIndexDdl::unsupported(
            index,
            reason,
            Some(self.suggested_action(index)),
        ))
    }

    fn generates_ddl(&self) -> bool {
        false
    }

    fn conversion_notes(&self, index: &IndexMetadata, _options: &ConversionConfig) -> String {
        self.reason(index)
    }
}
