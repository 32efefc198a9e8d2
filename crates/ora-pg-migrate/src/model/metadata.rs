//! Metadata extracted from the Oracle data dictionary.
//!
//! These types mirror what the extraction step reads from `ALL_TABLES`,
//! `ALL_CONSTRAINTS`, `ALL_INDEXES`, `ALL_SYNONYMS` and friends. They carry
//! Oracle spelling (uppercase names, Oracle type names) and are converted to
//! PostgreSQL only by the strategies.

use serde::{Deserialize, Serialize};

use super::plsql::SelectStatement;

fn default_true() -> bool {
    true
}

fn default_valid() -> String {
    "VALID".to_string()
}

fn default_normal() -> String {
    "NORMAL".to_string()
}

fn default_no_action() -> String {
    "NO ACTION".to_string()
}

/// Column definition of a table or view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column name.
    pub name: String,

    /// Oracle data type name (e.g. "VARCHAR2", "NUMBER").
    pub data_type: String,

    /// Character length for string types.
    #[serde(default)]
    pub length: Option<u32>,

    /// Numeric precision.
    #[serde(default)]
    pub precision: Option<u32>,

    /// Numeric scale.
    #[serde(default)]
    pub scale: Option<i32>,

    /// Whether NULL values are allowed.
    #[serde(default = "default_true")]
    pub nullable: bool,

    /// Default expression as written in Oracle.
    #[serde(default)]
    pub default_value: Option<String>,
}

impl ColumnMetadata {
    /// Create a nullable column with no length, precision or default.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            length: None,
            precision: None,
            scale: None,
            nullable: true,
            default_value: None,
        }
    }

    /// Mark the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Table metadata with its constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Owning schema.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// Column definitions in table order.
    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,

    /// Constraints defined on this table.
    #[serde(default)]
    pub constraints: Vec<ConstraintMetadata>,
}

impl TableMetadata {
    /// Create an empty table.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Find a column by name (case-insensitive).
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Builder-style column append.
    pub fn with_column(mut self, column: ColumnMetadata) -> Self {
        self.columns.push(column);
        self
    }

    /// Builder-style constraint append.
    pub fn with_constraint(mut self, constraint: ConstraintMetadata) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// View metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewMetadata {
    /// Owning schema.
    pub schema: String,

    /// View name.
    pub name: String,

    /// Output columns of the view.
    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,

    /// Query text as stored in `ALL_VIEWS.TEXT`.
    #[serde(default)]
    pub raw_query: String,

    /// Parsed query, when the parser succeeded.
    #[serde(default)]
    pub query: Option<SelectStatement>,
}

impl ViewMetadata {
    /// Create an empty view.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            raw_query: String::new(),
            query: None,
        }
    }

    /// Get the fully qualified view name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// An Oracle synonym: an alias that points at an object, possibly in another schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynonymMetadata {
    /// Schema owning the synonym ("PUBLIC" for public synonyms).
    pub schema: String,

    /// Synonym name.
    pub name: String,

    /// Schema of the referenced object.
    pub referenced_schema: String,

    /// Name of the referenced object.
    pub referenced_name: String,

    /// Object type tag of the referenced object (TABLE, VIEW, TYPE, PACKAGE, ...).
    #[serde(default)]
    pub referenced_type: String,
}

impl SynonymMetadata {
    /// Create a synonym.
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        referenced_schema: impl Into<String>,
        referenced_name: impl Into<String>,
        referenced_type: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            referenced_schema: referenced_schema.into(),
            referenced_name: referenced_name.into(),
            referenced_type: referenced_type.into(),
        }
    }

    /// Whether the referenced object carries the given type tag.
    pub fn references_type(&self, object_type: &str) -> bool {
        self.referenced_type.eq_ignore_ascii_case(object_type)
    }
}

/// Kind of table constraint.
///
/// Deserializes from either the descriptive name or the single-letter code
/// used by `ALL_CONSTRAINTS.CONSTRAINT_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    #[serde(alias = "P")]
    PrimaryKey,
    #[serde(alias = "R")]
    ForeignKey,
    #[serde(alias = "U")]
    Unique,
    #[serde(alias = "C")]
    Check,
    #[serde(alias = "N")]
    NotNull,
}

impl ConstraintKind {
    /// Parse a dictionary code or descriptive name.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "P" | "PRIMARY_KEY" | "PRIMARY KEY" => Some(Self::PrimaryKey),
            "R" | "FOREIGN_KEY" | "FOREIGN KEY" => Some(Self::ForeignKey),
            "U" | "UNIQUE" => Some(Self::Unique),
            "C" | "CHECK" => Some(Self::Check),
            "N" | "NOT_NULL" | "NOT NULL" => Some(Self::NotNull),
            _ => None,
        }
    }

    /// Single-letter dictionary code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PrimaryKey => "P",
            Self::ForeignKey => "R",
            Self::Unique => "U",
            Self::Check => "C",
            Self::NotNull => "N",
        }
    }

    /// Human-readable label used in generated comments.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PrimaryKey => "PRIMARY KEY",
            Self::ForeignKey => "FOREIGN KEY",
            Self::Unique => "UNIQUE",
            Self::Check => "CHECK",
            Self::NotNull => "NOT NULL",
        }
    }

    /// Position in dependency-safe application order.
    pub fn apply_order(&self) -> u8 {
        match self {
            Self::PrimaryKey => 0,
            Self::Unique => 1,
            Self::Check => 2,
            Self::ForeignKey => 3,
            Self::NotNull => 4,
        }
    }

    /// Whether PostgreSQL backs this constraint with a unique index.
    pub fn creates_index(&self) -> bool {
        matches!(self, Self::PrimaryKey | Self::Unique)
    }
}

/// Table constraint metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintMetadata {
    /// Constraint name.
    pub name: String,

    /// Constraint kind.
    pub kind: ConstraintKind,

    /// Constrained columns in key order.
    #[serde(default)]
    pub columns: Vec<String>,

    /// Referenced schema (foreign keys only).
    #[serde(default)]
    pub referenced_schema: Option<String>,

    /// Referenced table (foreign keys only).
    #[serde(default)]
    pub referenced_table: Option<String>,

    /// Referenced columns (foreign keys only).
    #[serde(default)]
    pub referenced_columns: Vec<String>,

    /// ON DELETE rule (default: NO ACTION).
    #[serde(default = "default_no_action")]
    pub delete_rule: String,

    /// ON UPDATE rule (default: NO ACTION). Oracle has none, kept for completeness.
    #[serde(default = "default_no_action")]
    pub update_rule: String,

    /// Check condition text (check constraints only).
    #[serde(default)]
    pub check_condition: Option<String>,

    /// DEFERRABLE flag.
    #[serde(default)]
    pub deferrable: bool,

    /// INITIALLY DEFERRED flag.
    #[serde(default)]
    pub initially_deferred: bool,
}

impl ConstraintMetadata {
    /// Create a constraint of the given kind over `columns`.
    pub fn new(name: impl Into<String>, kind: ConstraintKind, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            referenced_schema: None,
            referenced_table: None,
            referenced_columns: Vec::new(),
            delete_rule: default_no_action(),
            update_rule: default_no_action(),
            check_condition: None,
            deferrable: false,
            initially_deferred: false,
        }
    }

    /// Primary key constraint.
    pub fn primary_key(name: impl Into<String>, columns: &[&str]) -> Self {
        Self::new(name, ConstraintKind::PrimaryKey, columns)
    }

    /// Unique constraint.
    pub fn unique(name: impl Into<String>, columns: &[&str]) -> Self {
        Self::new(name, ConstraintKind::Unique, columns)
    }

    /// Check constraint.
    pub fn check(name: impl Into<String>, condition: impl Into<String>) -> Self {
        let mut c = Self::new(name, ConstraintKind::Check, &[]);
        c.check_condition = Some(condition.into());
        c
    }

    /// Foreign key constraint.
    pub fn foreign_key(
        name: impl Into<String>,
        columns: &[&str],
        referenced_schema: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_columns: &[&str],
    ) -> Self {
        let mut c = Self::new(name, ConstraintKind::ForeignKey, columns);
        c.referenced_schema = Some(referenced_schema.into());
        c.referenced_table = Some(referenced_table.into());
        c.referenced_columns = referenced_columns.iter().map(|s| s.to_string()).collect();
        c
    }

    /// Qualified referenced table, when this is a foreign key.
    pub fn referenced_full_name(&self) -> Option<String> {
        match (&self.referenced_schema, &self.referenced_table) {
            (Some(s), Some(t)) => Some(format!("{}.{}", s, t)),
            (None, Some(t)) => Some(t.clone()),
            _ => None,
        }
    }
}

/// One column (or expression) of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name. For function-based indexes this is the hidden SYS_NC column.
    pub name: String,

    /// Column expression for function-based indexes.
    #[serde(default)]
    pub expression: Option<String>,

    /// Descending sort order.
    #[serde(default)]
    pub descending: bool,

    /// 1-based position within the index.
    #[serde(default)]
    pub position: u32,
}

impl IndexColumn {
    /// Plain ascending column.
    pub fn new(name: impl Into<String>, position: u32) -> Self {
        Self {
            name: name.into(),
            expression: None,
            descending: false,
            position,
        }
    }

    /// Whether this entry is an expression rather than a plain column.
    pub fn is_expression(&self) -> bool {
        self.expression
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty())
    }
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Index name.
    pub name: String,

    /// Schema of the indexed table.
    pub schema: String,

    /// Indexed table.
    pub table: String,

    /// Oracle index type (NORMAL, BITMAP, FUNCTION-BASED NORMAL, NORMAL/REV, DOMAIN, CLUSTER, ...).
    #[serde(default = "default_normal")]
    pub index_type: String,

    /// UNIQUE index.
    #[serde(default)]
    pub unique: bool,

    /// Index status (VALID, UNUSABLE, ...).
    #[serde(default = "default_valid")]
    pub status: String,

    /// Partitioned index.
    #[serde(default)]
    pub partitioned: bool,

    /// Tablespace holding the index.
    #[serde(default)]
    pub tablespace: Option<String>,

    /// Indexed columns.
    #[serde(default)]
    pub columns: Vec<IndexColumn>,
}

impl IndexMetadata {
    /// Create a NORMAL, VALID index over plain columns.
    pub fn new(
        name: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
        columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            table: table.into(),
            index_type: default_normal(),
            unique: false,
            status: default_valid(),
            partitioned: false,
            tablespace: None,
            columns: columns
                .iter()
                .enumerate()
                .map(|(i, c)| IndexColumn::new(*c, i as u32 + 1))
                .collect(),
        }
    }

    /// Builder-style uniqueness.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Get the fully qualified index name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// More than one column.
    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }

    /// Any column is an expression.
    pub fn is_functional(&self) -> bool {
        self.index_type.to_uppercase().starts_with("FUNCTION-BASED")
            || self.columns.iter().any(IndexColumn::is_expression)
    }

    /// Oracle bitmap index.
    pub fn is_bitmap(&self) -> bool {
        self.index_type.to_uppercase().contains("BITMAP")
    }

    /// Plain B-tree index type.
    pub fn is_normal(&self) -> bool {
        self.index_type.eq_ignore_ascii_case("NORMAL")
    }

    /// Index is usable.
    pub fn is_valid(&self) -> bool {
        self.status.eq_ignore_ascii_case("VALID")
    }

    /// Column names sorted in position order.
    pub fn column_names(&self) -> Vec<&str> {
        let mut cols: Vec<&IndexColumn> = self.columns.iter().collect();
        cols.sort_by_key(|c| c.position);
        cols.into_iter().map(|c| c.name.as_str()).collect()
    }
}

/// Trigger metadata as extracted from `ALL_TRIGGERS`, used when the body could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerMetadata {
    /// Owning schema.
    pub schema: String,

    /// Trigger name.
    pub name: String,

    /// Timing and level, e.g. "BEFORE EACH ROW".
    #[serde(default)]
    pub trigger_type: String,

    /// Triggering events, e.g. "INSERT OR UPDATE".
    #[serde(default)]
    pub triggering_event: String,

    /// Owner of the target table.
    #[serde(default)]
    pub table_owner: String,

    /// Target table.
    #[serde(default)]
    pub table_name: String,

    /// ENABLED or DISABLED.
    #[serde(default)]
    pub status: String,

    /// Raw PL/SQL body.
    #[serde(default)]
    pub body: String,
}

impl TriggerMetadata {
    /// Get the fully qualified trigger name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_kind_codes() {
        assert_eq!(ConstraintKind::from_code("P"), Some(ConstraintKind::PrimaryKey));
        assert_eq!(ConstraintKind::from_code("r"), Some(ConstraintKind::ForeignKey));
        assert_eq!(ConstraintKind::from_code("UNIQUE"), Some(ConstraintKind::Unique));
        assert_eq!(ConstraintKind::from_code("X"), None);
        assert_eq!(ConstraintKind::Check.code(), "C");
    }

    #[test]
    fn test_constraint_kind_deserializes_codes() {
        let kind: ConstraintKind = serde_json::from_str("\"R\"").unwrap();
        assert_eq!(kind, ConstraintKind::ForeignKey);
        let kind: ConstraintKind = serde_json::from_str("\"PRIMARY_KEY\"").unwrap();
        assert_eq!(kind, ConstraintKind::PrimaryKey);
    }

    #[test]
    fn test_index_predicates() {
        let mut idx = IndexMetadata::new("IX_A", "HR", "EMP", &["A", "B"]);
        assert!(idx.is_composite());
        assert!(idx.is_normal());
        assert!(idx.is_valid());
        assert!(!idx.is_functional());

        idx.columns[1].expression = Some("UPPER(\"B\")".to_string());
        assert!(idx.is_functional());

        idx.index_type = "BITMAP".to_string();
        assert!(idx.is_bitmap());
        assert!(!idx.is_normal());
    }

    #[test]
    fn test_index_column_order() {
        let mut idx = IndexMetadata::new("IX", "HR", "T", &["A", "B"]);
        idx.columns[0].position = 2;
        idx.columns[1].position = 1;
        assert_eq!(idx.column_names(), vec!["B", "A"]);
    }

    #[test]
    fn test_table_column_lookup_is_case_insensitive() {
        let table = TableMetadata::new("HR", "EMPLOYEES")
            .with_column(ColumnMetadata::new("FIRST_NAME", "VARCHAR2"));
        assert!(table.column("first_name").is_some());
        assert!(table.column("LAST_NAME").is_none());
    }
}
