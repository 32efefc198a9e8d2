//! Symbol resolution over a [`SchemaRegistry`].
//!
//! Oracle code refers to objects through synonyms, unqualified names and
//! `name(args)` expressions that may be calls or collection subscripts.
//! PostgreSQL has no synonyms, so every reference has to be pinned to a real
//! schema and kind before DDL is generated. The resolver is a read-only view
//! over the registry; it is `Copy` and cheap to pass by value.
//!
//! Failure policy differs by operation:
//! - table/view lookups fail loudly with [`MigrateError::AmbiguousReference`];
//! - column and expression types degrade to a configured default type;
//! - function and procedure lookups return `None` and let the caller fall back.

mod columns;
mod functions;
mod synonym;

pub use synonym::{ObjectKind, ResolvedName, SynonymResolution};

use tracing::{debug, warn};

use crate::config::ConversionConfig;
use crate::error::{MigrateError, Result};
use crate::model::{
    Function, OraclePackage, Parameter, Procedure, RoutineBody, SchemaRegistry, Trigger,
};

/// Type returned when a column or expression type cannot be resolved.
pub const DEFAULT_COLUMN_TYPE: &str = "varchar2";

/// Default cap on synonym chain length.
pub const DEFAULT_MAX_SYNONYM_DEPTH: usize = 10;

/// Resolves names against a registry.
#[derive(Debug, Clone, Copy)]
pub struct SymbolResolver<'a> {
    registry: &'a SchemaRegistry,
    default_type: &'a str,
    max_depth: usize,
}

/// The routine whose body is being resolved: its parameters and declarations.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub parameters: &'a [Parameter],
    pub body: &'a RoutineBody,
    /// Package the routine belongs to.
    pub package: Option<&'a OraclePackage>,
}

impl<'a> Scope<'a> {
    pub fn of_function(function: &'a Function) -> Self {
        Self {
            parameters: &function.parameters,
            body: &function.body,
            package: None,
        }
    }

    pub fn of_procedure(procedure: &'a Procedure) -> Self {
        Self {
            parameters: &procedure.parameters,
            body: &procedure.body,
            package: None,
        }
    }

    pub fn of_trigger(trigger: &'a Trigger) -> Self {
        Self {
            parameters: &[],
            body: &trigger.body,
            package: None,
        }
    }

    /// Builder-style owning package.
    pub fn in_package(mut self, package: Option<&'a OraclePackage>) -> Self {
        self.package = package;
        self
    }

    /// Whether `name` is a parameter or local variable of the routine.
    pub fn shadows(&self, name: &str) -> bool {
        self.parameters
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(name))
            || self.body.declares_variable(name)
    }
}

impl<'a> SymbolResolver<'a> {
    /// Resolver with the default fallback type and synonym depth.
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            default_type: DEFAULT_COLUMN_TYPE,
            max_depth: DEFAULT_MAX_SYNONYM_DEPTH,
        }
    }

    /// Resolver configured from the conversion settings.
    pub fn with_config(registry: &'a SchemaRegistry, config: &'a ConversionConfig) -> Self {
        Self {
            registry,
            default_type: &config.default_column_type,
            max_depth: config.max_synonym_depth,
        }
    }

    /// Builder-style synonym depth cap.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    pub fn default_type(&self) -> &'a str {
        self.default_type
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Schema owning the object type `name`, as seen from `asking_schema`.
    ///
    /// Tries an exact match, then a synonym in `asking_schema` or PUBLIC whose
    /// target exists, then the first object type with that name in any schema.
    pub fn resolve_schema_for_object_type(&self, name: &str, asking_schema: &str) -> Option<String> {
        if let Some(t) = self.registry.find_object_type(asking_schema, name) {
            return Some(t.schema.clone());
        }

        match self.follow_synonyms(ObjectKind::ObjectType, asking_schema, name, true) {
            Ok(SynonymResolution::Found(resolved)) => return Some(resolved.schema),
            Ok(_) => {}
            Err(e) => warn!("Object type synonym lookup for {} stopped: {}", name, e),
        }

        let fallback = self.registry.find_object_type_any_schema(name)?;
        warn!(
            "Object type {} not visible from schema {}; using {}.{}",
            name, asking_schema, fallback.schema, fallback.name
        );
        Some(fallback.schema.clone())
    }

    /// Schema owning the table or view `name`, as seen from `schema`.
    ///
    /// An exact match wins. Otherwise exactly one synonym in `schema` must
    /// lead to an existing table or view; no synonym, several synonyms or a
    /// synonym pointing nowhere is an [`MigrateError::AmbiguousReference`].
    pub fn resolve_schema_for_table_or_view(&self, name: &str, schema: &str) -> Result<String> {
        match self.follow_synonyms(ObjectKind::TableOrView, schema, name, false)? {
            SynonymResolution::Found(resolved) => {
                debug!("Resolved {}.{} to schema {}", schema, name, resolved.schema);
                Ok(resolved.schema)
            }
            SynonymResolution::Dangling(s) => Err(MigrateError::ambiguous(
                name,
                schema,
                format!(
                    "Synonym {}.{} points to non-existent object: {}.{}",
                    s.schema, s.name, s.referenced_schema, s.referenced_name
                ),
            )),
            SynonymResolution::NotFound => Err(MigrateError::ambiguous(
                name,
                schema,
                format!("No synonym found for {}.{} in schema {}", schema, name, schema),
            )),
            SynonymResolution::Multiple(found) => Err(MigrateError::ambiguous(
                name,
                schema,
                format!(
                    "Multiple synonyms found for {}.{} in schema {} ({} candidates)",
                    schema,
                    name,
                    schema,
                    found.len()
                ),
            )),
        }
    }

    /// Real `(schema, name)` of a table or view, following synonyms.
    pub fn resolve_table_or_view(&self, name: &str, schema: &str) -> Result<ResolvedName> {
        match self.follow_synonyms(ObjectKind::TableOrView, schema, name, false)? {
            SynonymResolution::Found(resolved) => Ok(resolved),
            _ => {
                let schema = self.resolve_schema_for_table_or_view(name, schema)?;
                Ok(ResolvedName {
                    schema,
                    name: name.to_string(),
                })
            }
        }
    }
}
