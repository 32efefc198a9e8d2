//! Package strategies.
//!
//! PostgreSQL has no packages. Package types become domains or composite
//! types named after the package, routines are flattened into the schema and
//! package variables live in a per-package state table:
//!
//! ```text
//! hr.emp_pkg_state (variable_name, variable_value, variable_type)
//! hr.emp_pkg_init_variables()      seeds every variable with its default
//! hr.emp_pkg_get_<var>()           reads a value, initializing on first miss
//! hr.emp_pkg_set_<var>(p_value)    writes a value
//! ```
//!
//! Re-running the generated DDL keeps values already stored: the initializer
//! only refreshes the recorded type on conflict.

use std::collections::HashSet;
use std::fmt::Write as _;

use tracing::debug;

use crate::error::Result;
use crate::model::{OraclePackage, RoutineBody, SchemaRegistry, Variable};
use crate::plpgsql::{
    package_initializer, package_state_table, package_variable_getter, package_variable_setter,
    record_type_name, PlpgsqlRenderer,
};
use crate::resolver::Scope;
use crate::typemap::{collection_to_array, package_domain_name};

use super::routine::record_type_ddl;
use super::{FunctionRegistry, ProcedureRegistry, Strategy, StrategyRegistry, TransformContext};

/// Registries package routines are delegated to.
#[derive(Clone, Copy)]
pub struct RoutineStrategies<'r> {
    pub functions: &'r FunctionRegistry,
    pub procedures: &'r ProcedureRegistry,
}

pub trait PackageStrategy: Strategy {
    fn supports(&self, package: &OraclePackage) -> bool;

    fn transform(
        &self,
        package: &OraclePackage,
        ctx: &TransformContext<'_>,
        routines: RoutineStrategies<'_>,
        spec_only: bool,
    ) -> Result<String>;

    fn conversion_notes(&self, package: &OraclePackage) -> String;
}

pub type PackageRegistry = StrategyRegistry<dyn PackageStrategy>;

impl StrategyRegistry<dyn PackageStrategy> {
    pub fn with_builtins() -> Self {
        let mut registry = Self::new("package");
        registry.register(Box::new(StandardPackageStrategy));
        registry
    }

    pub fn select(&self, package: &OraclePackage) -> Option<&dyn PackageStrategy> {
        self.select_where(|s| s.supports(package))
    }

    pub fn transform(
        &self,
        package: &OraclePackage,
        ctx: &TransformContext<'_>,
        routines: RoutineStrategies<'_>,
        spec_only: bool,
    ) -> Result<String> {
        self.apply(
            &package.full_name(),
            |s| s.supports(package),
            |s| s.transform(package, ctx, routines, spec_only),
        )
    }

    pub fn conversion_notes(&self, package: &OraclePackage) -> Option<String> {
        self.select(package).map(|s| s.conversion_notes(package))
    }
}

/// Variables of the package and of its registered spec and body, without duplicates.
fn all_variables<'p>(package: &'p OraclePackage, registry: &'p SchemaRegistry) -> Vec<&'p Variable> {
    let mut seen = HashSet::new();
    [
        Some(package),
        registry.find_package_spec(&package.schema, &package.name),
        registry.find_package_body(&package.schema, &package.name),
    ]
    .into_iter()
    .flatten()
    .flat_map(|p| p.variables.iter())
    .filter(|v| seen.insert(v.name.to_lowercase()))
    .collect()
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Converts types, variables and routines of any package.
pub struct StandardPackageStrategy;

impl StandardPackageStrategy {
    fn collection_domains(&self, package: &OraclePackage) -> Vec<String> {
        package
            .collection_types
            .iter()
            .map(|c| {
                format!(
                    "CREATE DOMAIN {} AS {};",
                    package_domain_name(&package.schema, &package.name, &c.name),
                    collection_to_array(c, None, Some(package))
                )
            })
            .collect()
    }

    fn type_domains(&self, package: &OraclePackage, renderer: &PlpgsqlRenderer<'_>) -> Vec<String> {
        package
            .types
            .iter()
            .map(|t| {
                format!(
                    "CREATE DOMAIN {} AS {};",
                    package_domain_name(&package.schema, &package.name, &t.name),
                    renderer.type_name(&t.data_type)
                )
            })
            .collect()
    }

    fn record_types(&self, package: &OraclePackage, renderer: &PlpgsqlRenderer<'_>) -> Vec<String> {
        if package.record_types.is_empty() {
            return Vec::new();
        }
        let mut listing = String::from("-- Package record types:");
        let mut statements = Vec::new();
        for record in &package.record_types {
            let name = record_type_name(&package.schema, &package.name, &record.name);
            let _ = write!(listing, "\n-- - {} -> {}", record.name, name);
            statements.push(record_type_ddl(renderer, &name, record));
        }
        statements.insert(0, listing);
        statements
    }

    fn state_table(&self, package: &OraclePackage) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  variable_name text PRIMARY KEY,\n  variable_value text,\n  variable_type text\n);",
            package_state_table(&package.schema, &package.name)
        )
    }

    fn initializer(&self, package: &OraclePackage, ctx: &TransformContext<'_>, renderer: &PlpgsqlRenderer<'_>) -> String {
        // Defaults are rendered without the package scope so they cannot call back into a getter.
        let plain = PlpgsqlRenderer::new(ctx.resolver, &package.schema);
        let state = package_state_table(&package.schema, &package.name);

        let mut sql = format!(
            "CREATE OR REPLACE FUNCTION {}()\nRETURNS void\nLANGUAGE plpgsql AS $$\nBEGIN\n",
            package_initializer(&package.schema, &package.name)
        );
        for variable in all_variables(package, ctx.registry()) {
            let value = match &variable.default {
                Some(default) => format!("({})::text", plain.expression(default)),
                None => "NULL".to_string(),
            };
            let _ = writeln!(
                sql,
                "  INSERT INTO {} (variable_name, variable_value, variable_type)\n  VALUES ({}, {}, {})\n  ON CONFLICT (variable_name) DO UPDATE SET variable_type = EXCLUDED.variable_type;",
                state,
                quote_literal(&variable.name.to_lowercase()),
                value,
                quote_literal(&renderer.type_name(&variable.data_type))
            );
        }
        sql.push_str("END;\n$$;");
        sql
    }

    fn getter(&self, package: &OraclePackage, variable: &Variable, renderer: &PlpgsqlRenderer<'_>) -> String {
        let select = format!(
            "SELECT variable_value INTO v_value FROM {} WHERE variable_name = {};",
            package_state_table(&package.schema, &package.name),
            quote_literal(&variable.name.to_lowercase())
        );
        let pg_type = renderer.type_name(&variable.data_type);
        format!(
            "CREATE OR REPLACE FUNCTION {}()\nRETURNS {}\nLANGUAGE plpgsql AS $$\nDECLARE\n  v_value text;\nBEGIN\n  {}\n  IF NOT FOUND THEN\n    PERFORM {}();\n    {}\n  END IF;\n  RETURN v_value::{};\nEND;\n$$;",
            package_variable_getter(&package.schema, &package.name, &variable.name),
            pg_type,
            select,
            package_initializer(&package.schema, &package.name),
            select,
            pg_type
        )
    }

    fn setter(&self, package: &OraclePackage, variable: &Variable, renderer: &PlpgsqlRenderer<'_>) -> String {
        let pg_type = renderer.type_name(&variable.data_type);
        format!(
            "CREATE OR REPLACE FUNCTION {}(p_value {})\nRETURNS void\nLANGUAGE plpgsql AS $$\nBEGIN\n  INSERT INTO {} (variable_name, variable_value, variable_type)\n  VALUES ({}, p_value::text, {})\n  ON CONFLICT (variable_name) DO UPDATE SET variable_value = EXCLUDED.variable_value;\nEND;\n$$;",
            package_variable_setter(&package.schema, &package.name, &variable.name),
            pg_type,
            package_state_table(&package.schema, &package.name),
            quote_literal(&variable.name.to_lowercase()),
            quote_literal(&pg_type)
        )
    }
}

impl Strategy for StandardPackageStrategy {
    fn name(&self) -> &'static str {
        "Standard Package"
    }
}

impl PackageStrategy for StandardPackageStrategy {
    fn supports(&self, _package: &OraclePackage) -> bool {
        true
    }

    fn transform(
        &self,
        package: &OraclePackage,
        ctx: &TransformContext<'_>,
        routines: RoutineStrategies<'_>,
        spec_only: bool,
    ) -> Result<String> {
        debug!(
            "Transforming package {} (spec_only={}, {} functions, {} procedures, {} variables)",
            package.full_name(),
            spec_only,
            package.functions.len(),
            package.procedures.len(),
            package.variables.len()
        );

        let no_body = RoutineBody::default();
        let scope = Scope {
            parameters: &[],
            body: &no_body,
            package: Some(package),
        };
        let renderer = PlpgsqlRenderer::new(ctx.resolver, &package.schema).with_scope(scope);

        let mut statements = self.collection_domains(package);
        statements.extend(self.type_domains(package, &renderer));
        statements.extend(self.record_types(package, &renderer));

        if !package.variables.is_empty() {
            statements.push(self.state_table(package));
            statements.push(self.initializer(package, ctx, &renderer));
            for variable in &package.variables {
                statements.push(self.getter(package, variable, &renderer));
                if !variable.constant {
                    statements.push(self.setter(package, variable, &renderer));
                }
            }
        }

        for function in &package.functions {
            statements.push(routines.functions.transform(function, ctx, spec_only)?);
        }
        for procedure in &package.procedures {
            statements.push(routines.procedures.transform(procedure, ctx, spec_only)?);
        }

        let mut sql = statements.join("\n\n");
        if !sql.is_empty() && !sql.ends_with('\n') {
            sql.push('\n');
        }
        Ok(sql)
    }

    fn conversion_notes(&self, package: &OraclePackage) -> String {
        let mut notes = String::from("Converted using standard package transformation");
        if !package.variables.is_empty() {
            let _ = write!(
                notes,
                "; Package variables emulated with state table {}",
                package_state_table(&package.schema, &package.name)
            );
        }
        if !package.types.is_empty() || !package.collection_types.is_empty() {
            notes.push_str("; Package types implemented as PostgreSQL domain types");
        }
        if !package.record_types.is_empty() {
            notes.push_str("; Package record types implemented as PostgreSQL composite types");
        }
        if !package.cursors.is_empty() {
            notes.push_str("; Package cursors not converted");
        }
        notes
    }
}
