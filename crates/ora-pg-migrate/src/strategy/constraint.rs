//! Constraint strategies.
//!
//! Each strategy owns exactly one constraint kind. Constraints are emitted as
//! `ALTER TABLE ... ADD CONSTRAINT` statements after the tables exist; NOT
//! NULL is carried by the column definition and has no strategy here.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{MigrateError, Result};
use crate::identifier::{pg_identifier, qualify, validate_check_condition, validate_identifier};
use crate::model::{ConstraintKind, ConstraintMetadata, TableMetadata};
use crate::plpgsql::rewrite_outside_literals;

use super::{Strategy, StrategyRegistry, TransformContext};

/// Oracle spellings rewritten inside check conditions.
static CHECK_REWRITES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\b(SYSTIMESTAMP|SYSDATE)\b", "CURRENT_TIMESTAMP"),
        (r"(?i)\bUSER\b", "CURRENT_USER"),
        (r"(?i)\bVARCHAR2\b", "TEXT"),
        (r"(?i)\bNUMBER\b", "NUMERIC"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("check rewrite pattern is valid"),
            replacement,
        )
    })
    .collect()
});

/// Conversion of one constraint kind.
pub trait ConstraintStrategy: Strategy {
    /// The constraint kind this strategy owns.
    fn constraint_kind(&self) -> ConstraintKind;

    fn supports(&self, constraint: &ConstraintMetadata) -> bool {
        constraint.kind == self.constraint_kind()
    }

    /// `CONSTRAINT name ...` clause, without the surrounding ALTER TABLE.
    fn transform(&self, constraint: &ConstraintMetadata, ctx: &TransformContext<'_>)
        -> Result<String>;

    /// Check that everything the constraint depends on is part of the migration.
    fn validate_dependencies(
        &self,
        _constraint: &ConstraintMetadata,
        _ctx: &TransformContext<'_>,
    ) -> Result<()> {
        Ok(())
    }

    /// Short description for generated comments and reports.
    fn conversion_notes(&self, constraint: &ConstraintMetadata) -> String;
}

pub type ConstraintRegistry = StrategyRegistry<dyn ConstraintStrategy>;

impl StrategyRegistry<dyn ConstraintStrategy> {
    /// Registry holding the primary key, unique, check and foreign key strategies.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new("constraint");
        registry.register(Box::new(PrimaryKeyConstraintStrategy));
        registry.register(Box::new(UniqueConstraintStrategy));
        registry.register(Box::new(CheckConstraintStrategy));
        registry.register(Box::new(ForeignKeyConstraintStrategy));
        registry
    }

    pub fn select(&self, constraint: &ConstraintMetadata) -> Option<&dyn ConstraintStrategy> {
        self.select_where(|s| s.supports(constraint))
    }

    /// Validate dependencies and render the constraint clause.
    pub fn transform(
        &self,
        constraint: &ConstraintMetadata,
        ctx: &TransformContext<'_>,
    ) -> Result<String> {
        self.apply(
            &constraint.name,
            |s| s.supports(constraint),
            |s| {
                s.validate_dependencies(constraint, ctx)?;
                s.transform(constraint, ctx)
            },
        )
    }

    /// `ALTER TABLE schema.table ADD <constraint>;`
    pub fn transform_alter_table(
        &self,
        constraint: &ConstraintMetadata,
        table: &TableMetadata,
        ctx: &TransformContext<'_>,
    ) -> Result<String> {
        let clause = self.transform(constraint, ctx)?;
        Ok(format!(
            "ALTER TABLE {} ADD {};",
            qualify(&table.schema, &table.name),
            clause
        ))
    }

    /// Notes from the strategy that would handle `constraint`.
    pub fn conversion_notes(&self, constraint: &ConstraintMetadata) -> Option<String> {
        self.select(constraint).map(|s| s.conversion_notes(constraint))
    }
}

/// Header comment written above each exported constraint.
pub fn constraint_header(constraint: &ConstraintMetadata, table: &TableMetadata) -> String {
    let mut header = format!(
        "-- Constraint: {}\n-- Type: {}\n-- Table: {}\n",
        constraint.name,
        constraint.kind.label(),
        table.full_name()
    );
    if let Some(referenced) = constraint.referenced_full_name() {
        header.push_str(&format!("-- References: {}\n", referenced));
    }
    header
}

fn constraint_name(constraint: &ConstraintMetadata) -> Result<String> {
    validate_identifier(&constraint.name)?;
    Ok(pg_identifier(&constraint.name))
}

fn column_list(columns: &[String]) -> Result<String> {
    let mut rendered = Vec::with_capacity(columns.len());
    for column in columns {
        validate_identifier(column)?;
        rendered.push(pg_identifier(column));
    }
    Ok(rendered.join(", "))
}

fn require_columns(constraint: &ConstraintMetadata) -> Result<()> {
    if constraint.columns.is_empty() {
        return Err(MigrateError::unsupported(
            &constraint.name,
            format!("{} constraint has no columns", constraint.kind.label()),
        ));
    }
    Ok(())
}

fn deferrable_clause(constraint: &ConstraintMetadata) -> &'static str {
    match (constraint.deferrable, constraint.initially_deferred) {
        (true, true) => " DEFERRABLE INITIALLY DEFERRED",
        (true, false) => " DEFERRABLE",
        _ => "",
    }
}

fn map_referential_action(action: &str) -> &'static str {
    match action.trim().to_uppercase().replace('_', " ").as_str() {
        "CASCADE" => "CASCADE",
        "SET NULL" => "SET NULL",
        "SET DEFAULT" => "SET DEFAULT",
        "RESTRICT" => "RESTRICT",
        _ => "NO ACTION",
    }
}

/// Rewrite an Oracle check condition for PostgreSQL.
///
/// Quoted identifiers are re-rendered with [`pg_identifier`] so they match the
/// lowercased column names; string literals are left untouched.
pub fn transform_check_condition(condition: &str) -> String {
    rewrite_outside_literals(condition, |text| {
        CHECK_REWRITES
            .iter()
            .fold(text.to_string(), |acc, (pattern, replacement)| {
                pattern.replace_all(&acc, *replacement).into_owned()
            })
    })
}

// =============================================================================
// Primary key
// =============================================================================

pub struct PrimaryKeyConstraintStrategy;

impl Strategy for PrimaryKeyConstraintStrategy {
    fn name(&self) -> &'static str {
        "Primary Key"
    }

    fn priority(&self) -> i32 {
        100
    }
}

impl ConstraintStrategy for PrimaryKeyConstraintStrategy {
    fn constraint_kind(&self) -> ConstraintKind {
        ConstraintKind::PrimaryKey
    }

    fn transform(
        &self,
        constraint: &ConstraintMetadata,
        _ctx: &TransformContext<'_>,
    ) -> Result<String> {
        debug!("Transforming primary key constraint: {}", constraint.name);
        require_columns(constraint)?;
        Ok(format!(
            "CONSTRAINT {} PRIMARY KEY ({}){}",
            constraint_name(constraint)?,
            column_list(&constraint.columns)?,
            deferrable_clause(constraint)
        ))
    }

    fn conversion_notes(&self, constraint: &ConstraintMetadata) -> String {
        let mut notes = String::from("Primary key constraint");
        if constraint.deferrable {
            notes.push_str(" (deferrable)");
        }
        notes
    }
}

// =============================================================================
// Unique
// =============================================================================

pub struct UniqueConstraintStrategy;

impl Strategy for UniqueConstraintStrategy {
    fn name(&self) -> &'static str {
        "Unique"
    }

    fn priority(&self) -> i32 {
        50
    }
}

impl ConstraintStrategy for UniqueConstraintStrategy {
    fn constraint_kind(&self) -> ConstraintKind {
        ConstraintKind::Unique
    }

    fn transform(
        &self,
        constraint: &ConstraintMetadata,
        _ctx: &TransformContext<'_>,
    ) -> Result<String> {
        debug!("Transforming unique constraint: {}", constraint.name);
        require_columns(constraint)?;
        Ok(format!(
            "CONSTRAINT {} UNIQUE ({}){}",
            constraint_name(constraint)?,
            column_list(&constraint.columns)?,
            deferrable_clause(constraint)
        ))
    }

    fn conversion_notes(&self, constraint: &ConstraintMetadata) -> String {
        let mut notes = String::from("Unique constraint");
        if constraint.deferrable {
            notes.push_str(" (deferrable)");
        }
        notes
    }
}

// =============================================================================
// Check
// =============================================================================

pub struct CheckConstraintStrategy;

impl Strategy for CheckConstraintStrategy {
    fn name(&self) -> &'static str {
        "Check"
    }

    fn priority(&self) -> i32 {
        30
    }
}

impl ConstraintStrategy for CheckConstraintStrategy {
    fn constraint_kind(&self) -> ConstraintKind {
        ConstraintKind::Check
    }

    fn transform(
        &self,
        constraint: &ConstraintMetadata,
        _ctx: &TransformContext<'_>,
    ) -> Result<String> {
        debug!("Transforming check constraint: {}", constraint.name);
        let condition = constraint
            .check_condition
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                MigrateError::unsupported(&constraint.name, "check constraint has no condition")
            })?;
        validate_check_condition(condition)?;

        Ok(format!(
            "CONSTRAINT {} CHECK ({}){}",
            constraint_name(constraint)?,
            transform_check_condition(condition),
            deferrable_clause(constraint)
        ))
    }

    fn conversion_notes(&self, constraint: &ConstraintMetadata) -> String {
        let mut notes = String::from("Check constraint");
        if constraint.deferrable {
            notes.push_str(" (deferrable)");
        }
        let uses_oracle_functions = constraint
            .check_condition
            .as_deref()
            .is_some_and(|c| CHECK_REWRITES[..2].iter().any(|(p, _)| p.is_match(c)));
        if uses_oracle_functions {
            notes.push_str(" (contains transformed Oracle functions)");
        }
        notes
    }
}

// =============================================================================
// Foreign key
// =============================================================================

pub struct ForeignKeyConstraintStrategy;

impl Strategy for ForeignKeyConstraintStrategy {
    fn name(&self) -> &'static str {
        "Foreign Key"
    }

    fn priority(&self) -> i32 {
        10
    }
}

impl ConstraintStrategy for ForeignKeyConstraintStrategy {
    fn constraint_kind(&self) -> ConstraintKind {
        ConstraintKind::ForeignKey
    }

    fn transform(
        &self,
        constraint: &ConstraintMetadata,
        _ctx: &TransformContext<'_>,
    ) -> Result<String> {
        debug!("Transforming foreign key constraint: {}", constraint.name);
        require_columns(constraint)?;

        let referenced_table = constraint.referenced_table.as_deref().ok_or_else(|| {
            MigrateError::unsupported(&constraint.name, "foreign key has no referenced table")
        })?;
        validate_identifier(referenced_table)?;
        let referenced = qualify(
            constraint.referenced_schema.as_deref().unwrap_or_default(),
            referenced_table,
        );

        let mut ddl = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}",
            constraint_name(constraint)?,
            column_list(&constraint.columns)?,
            referenced
        );
        if !constraint.referenced_columns.is_empty() {
            ddl.push_str(&format!(" ({})", column_list(&constraint.referenced_columns)?));
        }

        let on_delete = map_referential_action(&constraint.delete_rule);
        if on_delete != "NO ACTION" {
            ddl.push_str(&format!(" ON DELETE {}", on_delete));
        }
        let on_update = map_referential_action(&constraint.update_rule);
        if on_update != "NO ACTION" {
            ddl.push_str(&format!(" ON UPDATE {}", on_update));
        }
        ddl.push_str(deferrable_clause(constraint));

        Ok(ddl)
    }

    /// The referenced table must be one of the migrated tables.
    fn validate_dependencies(
        &self,
        constraint: &ConstraintMetadata,
        ctx: &TransformContext<'_>,
    ) -> Result<()> {
        let referenced = constraint
            .referenced_full_name()
            .unwrap_or_else(|| "<none>".to_string());

        let exists = match (&constraint.referenced_schema, &constraint.referenced_table) {
            (Some(schema), Some(table)) => ctx.registry().find_table(schema, table).is_some(),
            _ => false,
        };

        if !exists {
            warn!(
                "Foreign key {} references table {} which is not part of the migration",
                constraint.name, referenced
            );
            return Err(MigrateError::dependency(&constraint.name, referenced));
        }
        Ok(())
    }

    fn conversion_notes(&self, constraint: &ConstraintMetadata) -> String {
        let mut notes = String::from("Foreign key constraint");
        let on_delete = map_referential_action(&constraint.delete_rule);
        if on_delete != "NO ACTION" {
            notes.push_str(&format!(" (ON DELETE {})", on_delete));
        }
        let on_update = map_referential_action(&constraint.update_rule);
        if on_update != "NO ACTION" {
            notes.push_str(&format!(" (ON UPDATE {})", on_update));
        }
        if constraint.deferrable {
            notes.push_str(" (deferrable)");
        }
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::model::SchemaRegistry;

    fn make_registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.add_table(TableMetadata::new("HR", "DEPARTMENTS"));
        registry.add_table(TableMetadata::new("HR", "EMPLOYEES"));
        registry
    }

    fn employees() -> TableMetadata {
        TableMetadata::new("HR", "EMPLOYEES")
    }

    #[test]
    fn test_builtins_sorted_by_priority() {
        let registry = ConstraintRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["Primary Key", "Unique", "Check", "Foreign Key"]
        );
    }

    #[test]
    fn test_primary_key_alter_table() {
        let schema = make_registry();
        let config = ConversionConfig::default();
        let ctx = TransformContext::new(&schema, &config);
        let registry = ConstraintRegistry::with_builtins();

        let pk = ConstraintMetadata::primary_key("PK_EMP", &["EMPLOYEE_ID"]);
        assert_eq!(
            registry.transform_alter_table(&pk, &employees(), &ctx).unwrap(),
            "ALTER TABLE hr.employees ADD CONSTRAINT pk_emp PRIMARY KEY (employee_id);"
        );
        assert_eq!(registry.select(&pk).unwrap().name(), "Primary Key");
    }

    #[test]
    fn test_unique_deferrable() {
        let schema = make_registry();
        let config = ConversionConfig::default();
        let ctx = TransformContext::new(&schema, &config);
        let registry = ConstraintRegistry::with_builtins();

        let mut uk = ConstraintMetadata::unique("UK_EMP_EMAIL", &["EMAIL", "ORDER"]);
        uk.deferrable = true;
        uk.initially_deferred = true;
        assert_eq!(
            registry.transform(&uk, &ctx).unwrap(),
            "CONSTRAINT uk_emp_email UNIQUE (email, \"order\") DEFERRABLE INITIALLY DEFERRED"
        );
        assert_eq!(
            registry.conversion_notes(&uk).unwrap(),
            "Unique constraint (deferrable)"
        );
    }

    #[test]
    fn test_check_condition_rewrites() {
        assert_eq!(
            transform_check_condition("\"HIRE_DATE\" <= SYSDATE"),
            "hire_date <= CURRENT_TIMESTAMP"
        );
        assert_eq!(
            transform_check_condition("created_by = USER AND user_id > 0"),
            "created_by = CURRENT_USER AND user_id > 0"
        );
        assert_eq!(
            transform_check_condition("CAST(x AS VARCHAR2(10)) <> 'SYSDATE'"),
            "CAST(x AS TEXT(10)) <> 'SYSDATE'"
        );
        assert_eq!(
            transform_check_condition("status IN ('it''s', 'B')"),
            "status IN ('it''s', 'B')"
        );
    }

    #[test]
    fn test_check_constraint_ddl_and_notes() {
        let schema = make_registry();
        let config = ConversionConfig::default();
        let ctx = TransformContext::new(&schema, &config);
        let registry = ConstraintRegistry::with_builtins();

        let ck = ConstraintMetadata::check("CK_SALARY", "\"SALARY\" > 0");
        assert_eq!(
            registry.transform(&ck, &ctx).unwrap(),
            "CONSTRAINT ck_salary CHECK (salary > 0)"
        );

        let dated = ConstraintMetadata::check("CK_DATE", "HIRE_DATE <= SYSDATE");
        assert_eq!(
            registry.conversion_notes(&dated).unwrap(),
            "Check constraint (contains transformed Oracle functions)"
        );
    }

    #[test]
    fn test_check_rejects_unsafe_condition() {
        let schema = make_registry();
        let config = ConversionConfig::default();
        let ctx = TransformContext::new(&schema, &config);
        let registry = ConstraintRegistry::with_builtins();

        let ck = ConstraintMetadata::check("CK_BAD", "1 = 1; DROP TABLE x");
        let err = registry.transform(&ck, &ctx).unwrap_err();
        assert!(matches!(err, MigrateError::StrategyFailed { .. }));
        assert!(err.format_detailed().contains("semicolon"));
    }

    #[test]
    fn test_foreign_key_actions() {
        let schema = make_registry();
        let config = ConversionConfig::default();
        let ctx = TransformContext::new(&schema, &config);
        let registry = ConstraintRegistry::with_builtins();

        let mut fk = ConstraintMetadata::foreign_key(
            "FK_EMP_DEPT",
            &["DEPARTMENT_ID"],
            "HR",
            "DEPARTMENTS",
            &["DEPARTMENT_ID"],
        );
        assert_eq!(
            registry.transform(&fk, &ctx).unwrap(),
            "CONSTRAINT fk_emp_dept FOREIGN KEY (department_id) REFERENCES hr.departments (department_id)"
        );

        fk.delete_rule = "CASCADE".to_string();
        fk.update_rule = "SET_NULL".to_string();
        fk.deferrable = true;
        assert_eq!(
            registry.transform(&fk, &ctx).unwrap(),
            "CONSTRAINT fk_emp_dept FOREIGN KEY (department_id) REFERENCES hr.departments (department_id) ON DELETE CASCADE ON UPDATE SET NULL DEFERRABLE"
        );
        assert_eq!(
            registry.conversion_notes(&fk).unwrap(),
            "Foreign key constraint (ON DELETE CASCADE) (ON UPDATE SET NULL) (deferrable)"
        );
    }

    #[test]
    fn test_foreign_key_to_missing_table_fails_validation() {
        let schema = make_registry();
        let config = ConversionConfig::default();
        let ctx = TransformContext::new(&schema, &config);
        let registry = ConstraintRegistry::with_builtins();

        let fk = ConstraintMetadata::foreign_key("FK_X", &["A"], "HR", "MISSING", &["ID"]);
        match registry.transform(&fk, &ctx).unwrap_err() {
            MigrateError::StrategyFailed {
                strategy, source, ..
            } => {
                assert_eq!(strategy, "Foreign Key");
                assert!(matches!(*source, MigrateError::DependencyValidation { .. }));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_not_null_has_no_strategy() {
        let schema = make_registry();
        let config = ConversionConfig::default();
        let ctx = TransformContext::new(&schema, &config);
        let registry = ConstraintRegistry::with_builtins();

        let nn = ConstraintMetadata::new("SYS_C001", ConstraintKind::NotNull, &["A"]);
        assert!(registry.select(&nn).is_none());
        assert!(matches!(
            registry.transform(&nn, &ctx).unwrap_err(),
            MigrateError::MissingStrategy { kind: "constraint", .. }
        ));
    }

    #[test]
    fn test_constraint_header() {
        let fk = ConstraintMetadata::foreign_key("FK_X", &["A"], "HR", "DEPARTMENTS", &["ID"]);
        let header = constraint_header(&fk, &employees());
        assert_eq!(
            header,
            "-- Constraint: FK_X\n-- Type: FOREIGN KEY\n-- Table: HR.EMPLOYEES\n-- References: HR.DEPARTMENTS\n"
        );
    }

    #[test]
    fn test_transform_is_repeatable() {
        let schema = make_registry();
        let config = ConversionConfig::default();
        let ctx = TransformContext::new(&schema, &config);
        let registry = ConstraintRegistry::with_builtins();
        let pk = ConstraintMetadata::primary_key("PK_EMP", &["EMPLOYEE_ID"]);
        assert_eq!(
            registry.transform(&pk, &ctx).unwrap(),
            registry.transform(&pk, &ctx).unwrap()
        );
    }
}
