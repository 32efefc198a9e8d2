//! Whole-registry conversion.
//!
//! [`Transformer`] owns one registry per construct kind and walks a
//! [`SchemaRegistry`] in dependency order, producing a [`MigrationScript`].
//! The order of the sections is what makes the script applicable top to
//! bottom:
//!
//! 1. schemas
//! 2. tables
//! 3. placeholder views, so routines that read them compile
//! 4. object types, package specs (stub bodies) and local record types
//! 5. standalone routines and object type members
//! 6. package bodies
//! 7. full views
//! 8. constraints, primary keys first and foreign keys after unique and check
//! 9. indexes that no constraint already creates
//! 10. triggers
//!
//! A failure converting one object never aborts the run. It is collected in
//! [`MigrationScript::failures`]; foreign keys whose referenced table is not
//! part of the migration are collected in [`MigrationScript::skipped`].

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::ConversionConfig;
use crate::error::{MigrateError, Result};
use crate::identifier::{pg_identifier, qualify};
use crate::model::{ConstraintKind, ObjectType, RecordType, SchemaRegistry};
use crate::ordering::ordered_registry_constraints;
use crate::plpgsql::PlpgsqlRenderer;
use crate::strategy::constraint::constraint_header;
use crate::strategy::routine::{local_record_types, record_type_ddl};
use crate::strategy::{
    ConstraintRegistry, FunctionRegistry, IndexConversionResult, IndexRegistry, PackageRegistry,
    ProcedureRegistry, RoutineStrategies, TableRegistry, TransformContext, TriggerRegistry,
    ViewRegistry,
};

pub const SECTION_SCHEMAS: &str = "Schemas";
pub const SECTION_TABLES: &str = "Tables";
pub const SECTION_VIEW_PLACEHOLDERS: &str = "View placeholders";
pub const SECTION_TYPES: &str = "Types and package specifications";
pub const SECTION_ROUTINES: &str = "Functions and procedures";
pub const SECTION_PACKAGE_BODIES: &str = "Package bodies";
pub const SECTION_VIEWS: &str = "Views";
pub const SECTION_CONSTRAINTS: &str = "Constraints";
pub const SECTION_INDEXES: &str = "Indexes";
pub const SECTION_TRIGGERS: &str = "Triggers";

/// Strategy registries for every construct kind.
pub struct Transformer {
    pub tables: TableRegistry,
    pub constraints: ConstraintRegistry,
    pub indexes: IndexRegistry,
    pub triggers: TriggerRegistry,
    pub views: ViewRegistry,
    pub packages: PackageRegistry,
    pub functions: FunctionRegistry,
    pub procedures: ProcedureRegistry,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Named group of statements in the generated script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptSection {
    pub name: &'static str,
    pub statements: Vec<String>,
}

/// An object that could not be converted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionFailure {
    /// Construct kind, e.g. "view".
    pub kind: &'static str,
    /// Identity of the object.
    pub input: String,
    /// Strategy that failed. `None` when no strategy applied.
    pub strategy: Option<String>,
    pub message: String,
}

/// Output of [`Transformer::convert_registry`].
#[derive(Debug, Clone, Default)]
pub struct MigrationScript {
    pub sections: Vec<ScriptSection>,
    pub failures: Vec<ConversionFailure>,
    /// Foreign keys left out because the referenced table is missing.
    pub skipped: Vec<ConversionFailure>,
    pub index_result: IndexConversionResult,
}

impl MigrationScript {
    /// Render the script. `header` is written verbatim before the first section.
    pub fn to_sql(&self, header: &str) -> String {
        let mut sql = String::from(header);
        if !sql.is_empty() && !sql.ends_with('\n') {
            sql.push('\n');
        }
        for section in self.sections.iter().filter(|s| !s.statements.is_empty()) {
            sql.push_str("\n-- =============================================================================\n");
            sql.push_str(&format!("-- {}\n", section.name));
            sql.push_str("-- =============================================================================\n\n");
            for statement in &section.statements {
                sql.push_str(statement.trim_end());
                sql.push_str("\n\n");
            }
        }
        sql
    }

    pub fn section(&self, name: &str) -> Option<&ScriptSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn statement_count(&self) -> usize {
        self.sections.iter().map(|s| s.statements.len()).sum()
    }

    /// Failures and skipped objects as pretty-printed JSON.
    pub fn failures_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Report<'a> {
            failures: &'a [ConversionFailure],
            skipped: &'a [ConversionFailure],
        }
        Ok(serde_json::to_string_pretty(&Report {
            failures: &self.failures,
            skipped: &self.skipped,
        })?)
    }

    fn push_section(&mut self, name: &'static str, statements: Vec<String>) {
        info!("{}: {} statements", name, statements.len());
        self.sections.push(ScriptSection { name, statements });
    }

    fn record_failure(&mut self, fallback_kind: &'static str, identity: &str, err: MigrateError) {
        match &err {
            MigrateError::StrategyFailed {
                kind,
                input,
                strategy,
                source,
            } => {
                let entry = ConversionFailure {
                    kind: *kind,
                    input: input.clone(),
                    strategy: Some(strategy.clone()),
                    message: source.to_string(),
                };
                if matches!(source.as_ref(), MigrateError::DependencyValidation { .. }) {
                    warn!("Skipping {} {}: {}", kind, input, source);
                    self.skipped.push(entry);
                } else {
                    self.failures.push(entry);
                }
            }
            MigrateError::MissingStrategy { kind, input } => {
                warn!("{}", err);
                self.failures.push(ConversionFailure {
                    kind: *kind,
                    input: input.clone(),
                    strategy: None,
                    message: err.to_string(),
                });
            }
            _ => {
                error!("Failed to convert {} {}: {}", fallback_kind, identity, err);
                self.failures.push(ConversionFailure {
                    kind: fallback_kind,
                    input: identity.to_string(),
                    strategy: None,
                    message: err.to_string(),
                });
            }
        }
    }

    /// Push the converted statement or record why it failed.
    fn collect(
        &mut self,
        statements: &mut Vec<String>,
        kind: &'static str,
        identity: &str,
        result: Result<String>,
    ) {
        match result {
            Ok(sql) => statements.push(sql),
            Err(e) => self.record_failure(kind, identity, e),
        }
    }
}

impl Transformer {
    /// Transformer using the built-in strategies of every kind.
    pub fn with_builtins() -> Self {
        Self {
            tables: TableRegistry::with_builtins(),
            constraints: ConstraintRegistry::with_builtins(),
            indexes: IndexRegistry::with_builtins(),
            triggers: TriggerRegistry::with_builtins(),
            views: ViewRegistry::with_builtins(),
            packages: PackageRegistry::with_builtins(),
            functions: FunctionRegistry::with_builtins(),
            procedures: ProcedureRegistry::with_builtins(),
        }
    }

    fn routines(&self) -> RoutineStrategies<'_> {
        RoutineStrategies {
            functions: &self.functions,
            procedures: &self.procedures,
        }
    }

    /// Convert every object of `registry` that the schema filter keeps.
    pub fn convert_registry(
        &self,
        registry: &SchemaRegistry,
        options: &ConversionConfig,
        include_comments: bool,
    ) -> MigrationScript {
        info!(
            "Converting registry with {} objects",
            registry.object_count()
        );
        let ctx = TransformContext::new(registry, options);
        let mut script = MigrationScript::default();

        let schemas = self.schemas(registry, options);
        script.push_section(SECTION_SCHEMAS, schemas);

        let tables = self.tables_section(&mut script, registry, options, &ctx);
        script.push_section(SECTION_TABLES, tables);

        let placeholders = if options.view_placeholders {
            self.views_section(&mut script, registry, options, &ctx, true)
        } else {
            Vec::new()
        };
        script.push_section(SECTION_VIEW_PLACEHOLDERS, placeholders);

        let types = self.types_section(&mut script, registry, options, &ctx);
        script.push_section(SECTION_TYPES, types);

        let routines = self.routines_section(&mut script, registry, options, &ctx);
        script.push_section(SECTION_ROUTINES, routines);

        let bodies = self.package_bodies_section(&mut script, registry, options, &ctx);
        script.push_section(SECTION_PACKAGE_BODIES, bodies);

        let views = self.views_section(&mut script, registry, options, &ctx, false);
        script.push_section(SECTION_VIEWS, views);

        let constraints = self.constraints_section(&mut script, registry, options, &ctx, include_comments);
        script.push_section(SECTION_CONSTRAINTS, constraints);

        let indexes = self.indexes_section(&mut script, registry, options, &ctx);
        script.push_section(SECTION_INDEXES, indexes);

        let triggers = self.triggers_section(&mut script, registry, options, &ctx);
        script.push_section(SECTION_TRIGGERS, triggers);

        info!(
            "Conversion finished: {} statements, {} failures, {} skipped",
            script.statement_count(),
            script.failures.len(),
            script.skipped.len()
        );
        script
    }

    fn schemas(&self, registry: &SchemaRegistry, options: &ConversionConfig) -> Vec<String> {
        let owners = registry
            .tables
            .iter()
            .map(|t| t.schema.as_str())
            .chain(registry.views.iter().map(|v| v.schema.as_str()))
            .chain(registry.object_types.iter().map(|t| t.schema.as_str()))
            .chain(registry.package_specs.iter().map(|p| p.schema.as_str()))
            .chain(registry.package_bodies.iter().map(|p| p.schema.as_str()))
            .chain(registry.functions.iter().map(|f| f.schema.as_str()))
            .chain(registry.procedures.iter().map(|p| p.schema.as_str()))
            .filter(|s| !s.is_empty() && options.includes_schema(s));

        let names: BTreeSet<String> = owners.map(pg_identifier).collect();
        names
            .into_iter()
            .map(|s| format!("CREATE SCHEMA IF NOT EXISTS {};", s))
            .collect()
    }

    fn tables_section(
        &self,
        script: &mut MigrationScript,
        registry: &SchemaRegistry,
        options: &ConversionConfig,
        ctx: &TransformContext<'_>,
    ) -> Vec<String> {
        let mut statements = Vec::new();
        for table in registry.tables.iter().filter(|t| options.includes_schema(&t.schema)) {
            let result = self.tables.transform(table, ctx);
            script.collect(&mut statements, "table", &table.full_name(), result);
        }
        statements
    }

    fn views_section(
        &self,
        script: &mut MigrationScript,
        registry: &SchemaRegistry,
        options: &ConversionConfig,
        ctx: &TransformContext<'_>,
        placeholder: bool,
    ) -> Vec<String> {
        let mut statements = Vec::new();
        for view in registry.views.iter().filter(|v| options.includes_schema(&v.schema)) {
            let result = if placeholder {
                self.views.transform_empty(view, ctx)
            } else {
                self.views.transform(view, ctx)
            };
            // A view without a strategy is reported once, by the full pass.
            if placeholder && result.is_err() {
                debug!("No placeholder for view {}", view.full_name());
                continue;
            }
            script.collect(&mut statements, "view", &view.full_name(), result);
        }
        statements
    }

    fn types_section(
        &self,
        script: &mut MigrationScript,
        registry: &SchemaRegistry,
        options: &ConversionConfig,
        ctx: &TransformContext<'_>,
    ) -> Vec<String> {
        let mut statements = Vec::new();

        for object_type in registry
            .object_types
            .iter()
            .filter(|t| options.includes_schema(&t.schema))
        {
            statements.push(object_type_ddl(ctx, object_type));
        }

        for package in registry
            .package_specs
            .iter()
            .filter(|p| options.includes_schema(&p.schema))
        {
            let result = self.packages.transform(package, ctx, self.routines(), true);
            script.collect(&mut statements, "package", &package.full_name(), result);
        }

        let routine_bodies = registry
            .functions
            .iter()
            .map(|f| (&f.schema, f.parent.as_deref(), &f.name, &f.body))
            .chain(
                registry
                    .procedures
                    .iter()
                    .map(|p| (&p.schema, p.parent.as_deref(), &p.name, &p.body)),
            )
            .chain(registry.package_bodies.iter().flat_map(|pkg| {
                pkg.functions
                    .iter()
                    .map(|f| (&f.schema, f.parent.as_deref(), &f.name, &f.body))
                    .chain(
                        pkg.procedures
                            .iter()
                            .map(|p| (&p.schema, p.parent.as_deref(), &p.name, &p.body)),
                    )
            }))
            .chain(registry.object_types.iter().flat_map(|t| {
                t.functions
                    .iter()
                    .map(|f| (&f.schema, f.parent.as_deref(), &f.name, &f.body))
                    .chain(
                        t.procedures
                            .iter()
                            .map(|p| (&p.schema, p.parent.as_deref(), &p.name, &p.body)),
                    )
            }));

        for (schema, parent, name, body) in routine_bodies {
            if options.includes_schema(schema) {
                statements.extend(local_record_types(ctx, schema, parent, name, body));
            }
        }
        statements
    }

    fn routines_section(
        &self,
        script: &mut MigrationScript,
        registry: &SchemaRegistry,
        options: &ConversionConfig,
        ctx: &TransformContext<'_>,
    ) -> Vec<String> {
        let mut statements = Vec::new();
        let spec_only = options.spec_only;

        let object_functions = registry.object_types.iter().flat_map(|t| t.functions.iter());
        for function in registry
            .functions
            .iter()
            .chain(object_functions)
            .filter(|f| options.includes_schema(&f.schema))
        {
            let result = self.functions.transform(function, ctx, spec_only);
            script.collect(&mut statements, "function", &function.full_name(), result);
        }

        let object_procedures = registry.object_types.iter().flat_map(|t| t.procedures.iter());
        for procedure in registry
            .procedures
            .iter()
            .chain(object_procedures)
            .filter(|p| options.includes_schema(&p.schema))
        {
            let result = self.procedures.transform(procedure, ctx, spec_only);
            script.collect(&mut statements, "procedure", &procedure.full_name(), result);
        }
        statements
    }

    fn package_bodies_section(
        &self,
        script: &mut MigrationScript,
        registry: &SchemaRegistry,
        options: &ConversionConfig,
        ctx: &TransformContext<'_>,
    ) -> Vec<String> {
        let mut statements = Vec::new();
        for package in registry
            .package_bodies
            .iter()
            .filter(|p| options.includes_schema(&p.schema))
        {
            let result = self
                .packages
                .transform(package, ctx, self.routines(), options.spec_only);
            script.collect(&mut statements, "package", &package.full_name(), result);
        }
        statements
    }

    fn constraints_section(
        &self,
        script: &mut MigrationScript,
        registry: &SchemaRegistry,
        options: &ConversionConfig,
        ctx: &TransformContext<'_>,
        include_comments: bool,
    ) -> Vec<String> {
        let mut statements = Vec::new();
        for (table, constraint) in ordered_registry_constraints(registry) {
            if !options.includes_schema(&table.schema) {
                continue;
            }
            // NOT NULL is part of the column definition.
            if constraint.kind == ConstraintKind::NotNull {
                continue;
            }
            match self.constraints.transform_alter_table(constraint, table, ctx) {
                Ok(sql) if include_comments => {
                    statements.push(format!("{}{}", constraint_header(constraint, table), sql))
                }
                Ok(sql) => statements.push(sql),
                Err(e) => script.record_failure("constraint", &constraint.name, e),
            }
        }
        statements
    }

    fn indexes_section(
        &self,
        script: &mut MigrationScript,
        registry: &SchemaRegistry,
        options: &ConversionConfig,
        ctx: &TransformContext<'_>,
    ) -> Vec<String> {
        let indexes: Vec<_> = registry
            .indexes
            .iter()
            .filter(|i| options.includes_schema(&i.schema))
            .cloned()
            .collect();
        let result = self.indexes.convert_all(&indexes, ctx);

        let mut statements: Vec<String> = result
            .supported
            .iter()
            .filter(|ddl| ddl.is_executable())
            .map(|ddl| ddl.formatted_sql())
            .collect();
        if !result.unsupported.is_empty() {
            statements.push(result.unsupported_report());
        }
        script.index_result = result;
        statements
    }

    fn triggers_section(
        &self,
        script: &mut MigrationScript,
        registry: &SchemaRegistry,
        options: &ConversionConfig,
        ctx: &TransformContext<'_>,
    ) -> Vec<String> {
        let mut statements = Vec::new();
        for trigger in registry.triggers.iter().filter(|t| options.includes_schema(&t.schema)) {
            let result = self.triggers.transform(trigger, ctx).map(|ddl| ddl.to_sql());
            script.collect(&mut statements, "trigger", &trigger.full_name(), result);
        }

        let unparsed = registry.trigger_metadata.iter().filter(|m| {
            options.includes_schema(&m.schema)
                && !registry
                    .triggers
                    .iter()
                    .any(|t| t.full_name().eq_ignore_ascii_case(&m.full_name()))
        });
        for metadata in unparsed {
            debug!("Emitting stub for unparsed trigger {}", metadata.full_name());
            let result = self
                .triggers
                .transform_stub(metadata, ctx)
                .map(|ddl| ddl.to_sql());
            script.collect(&mut statements, "trigger", &metadata.full_name(), result);
        }
        statements
    }
}

/// `CREATE TYPE schema.name AS (...)` for an object type's attributes.
fn object_type_ddl(ctx: &TransformContext<'_>, object_type: &ObjectType) -> String {
    let renderer = PlpgsqlRenderer::new(ctx.resolver, &object_type.schema);
    let record = RecordType {
        name: object_type.name.clone(),
        fields: object_type.attributes.clone(),
    };
    let type_name = qualify(&object_type.schema, &object_type.name);
    record_type_ddl(&renderer, &type_name, &record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ColumnMetadata, ConstraintMetadata, DataType, Expression, Function, IndexMetadata,
        OraclePackage, RecordField, RoutineBody, Statement, TableMetadata, TriggerMetadata,
        Variable, ViewMetadata,
    };

    fn make_registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.add_table(
            TableMetadata::new("HR", "DEPARTMENTS")
                .with_column(ColumnMetadata::new("ID", "NUMBER").not_null())
                .with_constraint(ConstraintMetadata::primary_key("PK_DEPT", &["ID"])),
        );
        registry.add_table(
            TableMetadata::new("HR", "EMPLOYEES")
                .with_column(ColumnMetadata::new("ID", "NUMBER").not_null())
                .with_column(ColumnMetadata::new("DEPT_ID", "NUMBER"))
                .with_constraint(ConstraintMetadata::foreign_key(
                    "FK_EMP_DEPT",
                    &["DEPT_ID"],
                    "HR",
                    "DEPARTMENTS",
                    &["ID"],
                ))
                .with_constraint(ConstraintMetadata::foreign_key(
                    "FK_EMP_BONUS",
                    &["ID"],
                    "PAYROLL",
                    "BONUSES",
                    &["ID"],
                ))
                .with_constraint(ConstraintMetadata::primary_key("PK_EMP", &["ID"])),
        );
        registry.add_index(IndexMetadata::new("UX_EMP_ID", "HR", "EMPLOYEES", &["ID"]).unique());
        registry.add_index(IndexMetadata::new("IX_EMP_DEPT", "HR", "EMPLOYEES", &["DEPT_ID"]));
        registry
    }

    fn statements<'s>(script: &'s MigrationScript, name: &str) -> &'s [String] {
        script
            .section(name)
            .map(|s| s.statements.as_slice())
            .unwrap_or(&[])
    }

    // =========================================================================
    // Sections
    // =========================================================================

    #[test]
    fn test_sections_in_dependency_order() {
        let script = Transformer::with_builtins().convert_registry(
            &make_registry(),
            &ConversionConfig::default(),
            false,
        );
        let names: Vec<&str> = script.sections.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                SECTION_SCHEMAS,
                SECTION_TABLES,
                SECTION_VIEW_PLACEHOLDERS,
                SECTION_TYPES,
                SECTION_ROUTINES,
                SECTION_PACKAGE_BODIES,
                SECTION_VIEWS,
                SECTION_CONSTRAINTS,
                SECTION_INDEXES,
                SECTION_TRIGGERS,
            ]
        );
        assert_eq!(
            statements(&script, SECTION_SCHEMAS),
            ["CREATE SCHEMA IF NOT EXISTS hr;".to_string()]
        );
        assert_eq!(statements(&script, SECTION_TABLES).len(), 2);
    }

    #[test]
    fn test_constraints_ordered_and_missing_reference_skipped() {
        let script = Transformer::with_builtins().convert_registry(
            &make_registry(),
            &ConversionConfig::default(),
            false,
        );
        let constraints = statements(&script, SECTION_CONSTRAINTS);
        assert_eq!(constraints.len(), 3);
        assert!(constraints[0].contains("PRIMARY KEY"));
        assert!(constraints[1].contains("PRIMARY KEY"));
        assert!(constraints[2].contains("FOREIGN KEY"));

        assert_eq!(script.skipped.len(), 1);
        assert_eq!(script.skipped[0].input, "FK_EMP_BONUS");
        assert!(!script.has_failures());
    }

    #[test]
    fn test_constraint_headers_with_comments() {
        let script = Transformer::with_builtins().convert_registry(
            &make_registry(),
            &ConversionConfig::default(),
            true,
        );
        let constraints = statements(&script, SECTION_CONSTRAINTS);
        assert!(constraints[0].starts_with("-- Constraint: PK_DEPT\n"));
        assert!(constraints[0].contains("ALTER TABLE hr.departments ADD"));
    }

    #[test]
    fn test_index_duplicating_primary_key_is_excluded() {
        let script = Transformer::with_builtins().convert_registry(
            &make_registry(),
            &ConversionConfig::default(),
            false,
        );
        assert_eq!(script.index_result.conflicting, 1);
        let indexes = statements(&script, SECTION_INDEXES);
        assert_eq!(indexes.len(), 1);
        assert!(indexes[0].contains("CREATE INDEX ix_emp_dept ON hr.employees (dept_id)"));
    }

    #[test]
    fn test_schema_filter() {
        let mut registry = make_registry();
        registry.add_table(
            TableMetadata::new("SALES", "ORDERS").with_column(ColumnMetadata::new("ID", "NUMBER")),
        );
        let options = ConversionConfig {
            schemas: Some(vec!["sales".to_string()]),
            ..Default::default()
        };
        let script = Transformer::with_builtins().convert_registry(&registry, &options, false);
        assert_eq!(
            statements(&script, SECTION_SCHEMAS),
            ["CREATE SCHEMA IF NOT EXISTS sales;".to_string()]
        );
        assert_eq!(statements(&script, SECTION_TABLES).len(), 1);
        assert!(statements(&script, SECTION_CONSTRAINTS).is_empty());
    }

    // =========================================================================
    // Views, types and triggers
    // =========================================================================

    #[test]
    fn test_views_emitted_twice() {
        let mut registry = SchemaRegistry::new();
        let mut view = ViewMetadata::new("HR", "EMP_V");
        view.columns = vec![ColumnMetadata::new("ID", "NUMBER")];
        view.raw_query = "SELECT id FROM employees".into();
        registry.add_view(view);

        let transformer = Transformer::with_builtins();
        let script = transformer.convert_registry(&registry, &ConversionConfig::default(), false);
        assert_eq!(
            statements(&script, SECTION_VIEW_PLACEHOLDERS),
            ["CREATE OR REPLACE VIEW hr.emp_v (id) AS\nSELECT NULL::numeric AS id;".to_string()]
        );
        assert_eq!(
            statements(&script, SECTION_VIEWS),
            ["CREATE OR REPLACE VIEW hr.emp_v (id) AS\nSELECT id FROM employees;".to_string()]
        );

        let options = ConversionConfig {
            view_placeholders: false,
            ..Default::default()
        };
        let script = transformer.convert_registry(&registry, &options, false);
        assert!(statements(&script, SECTION_VIEW_PLACEHOLDERS).is_empty());
    }

    #[test]
    fn test_view_without_columns_reported_once() {
        let mut registry = SchemaRegistry::new();
        registry.add_view(ViewMetadata::new("HR", "BROKEN_V"));
        let script =
            Transformer::with_builtins().convert_registry(&registry, &ConversionConfig::default(), false);
        assert_eq!(script.failures.len(), 1);
        assert_eq!(script.failures[0].kind, "view");
        assert_eq!(script.failures[0].strategy, None);
    }

    #[test]
    fn test_object_type_and_package_spec() {
        let mut registry = SchemaRegistry::new();
        let mut point = ObjectType::new("HR", "POINT_T");
        point.attributes = vec![
            RecordField {
                name: "X".into(),
                data_type: DataType::native("NUMBER"),
            },
            RecordField {
                name: "Y".into(),
                data_type: DataType::native("NUMBER"),
            },
        ];
        registry.add_object_type(point);

        let mut spec = OraclePackage::new("HR", "EMP_PKG");
        spec.functions
            .push(Function::new("HR", "GET_RATE", DataType::native("NUMBER")));
        registry.add_package_spec(spec);

        let script =
            Transformer::with_builtins().convert_registry(&registry, &ConversionConfig::default(), false);
        let types = statements(&script, SECTION_TYPES);
        assert_eq!(types[0], "CREATE TYPE hr.point_t AS (\n  x numeric,\n  y numeric\n);");
        assert!(types[1].contains("return null;"));
        assert!(!script.has_failures());
    }

    #[test]
    fn test_package_body_uses_spec_variables() {
        let mut registry = SchemaRegistry::new();
        let mut spec = OraclePackage::new("HR", "EMP_PKG");
        spec.variables
            .push(Variable::new("G_RATE", DataType::native("NUMBER")));
        registry.add_package_spec(spec);
        let mut body = OraclePackage::new("HR", "EMP_PKG");
        let mut f = Function::new("HR", "GET_RATE", DataType::native("NUMBER"));
        f.body = RoutineBody::with_statements(vec![Statement::Return(Some(
            Expression::reference("g_rate"),
        ))]);
        body.functions.push(f);
        registry.add_package_body(body);

        let script =
            Transformer::with_builtins().convert_registry(&registry, &ConversionConfig::default(), false);
        let bodies = statements(&script, SECTION_PACKAGE_BODIES);
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].contains("CREATE TABLE IF NOT EXISTS hr.emp_pkg_state"));
    }

    #[test]
    fn test_unparsed_trigger_gets_stub() {
        let mut registry = make_registry();
        registry.add_trigger_metadata(TriggerMetadata {
            schema: "HR".into(),
            name: "EMP_AUDIT".into(),
            trigger_type: "AFTER EACH ROW".into(),
            triggering_event: "UPDATE".into(),
            table_owner: "HR".into(),
            table_name: "EMPLOYEES".into(),
            status: "ENABLED".into(),
            body: "BEGIN NULL; END;".into(),
        });
        let script =
            Transformer::with_builtins().convert_registry(&registry, &ConversionConfig::default(), false);
        let triggers = statements(&script, SECTION_TRIGGERS);
        assert_eq!(triggers.len(), 1);
        assert!(triggers[0].contains("CREATE TRIGGER emp_audit_pg"));
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    #[test]
    fn test_to_sql_skips_empty_sections() {
        let script = Transformer::with_builtins().convert_registry(
            &make_registry(),
            &ConversionConfig::default(),
            false,
        );
        let sql = script.to_sql("-- header");
        assert!(sql.starts_with("-- header\n"));
        assert!(sql.contains("-- Tables\n"));
        assert!(!sql.contains("-- Triggers\n"));
        assert!(sql.find("-- Tables\n") < sql.find("-- Constraints\n"));
    }

    #[test]
    fn test_failures_json() {
        let script = Transformer::with_builtins().convert_registry(
            &make_registry(),
            &ConversionConfig::default(),
            false,
        );
        let json = script.failures_json().unwrap();
        assert!(json.contains("\"skipped\""));
        assert!(json.contains("FK_EMP_BONUS"));
    }
}
