//! In-memory registry of everything extracted and parsed for one migration run.
//!
//! The registry is filled once by the extraction step and then read by the
//! resolver and the strategies. All lookups compare names case-insensitively
//! and return the first match in insertion order; duplicates are not rejected.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

use super::metadata::{
    ColumnMetadata, ConstraintMetadata, IndexMetadata, SynonymMetadata, TableMetadata,
    TriggerMetadata, ViewMetadata,
};
use super::plsql::{Function, ObjectType, OraclePackage, Procedure, Trigger};

/// Schema name used by public synonyms.
pub const PUBLIC_SCHEMA: &str = "PUBLIC";

/// All objects known to a migration run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaRegistry {
    #[serde(default)]
    pub tables: Vec<TableMetadata>,
    #[serde(default)]
    pub views: Vec<ViewMetadata>,
    #[serde(default)]
    pub synonyms: Vec<SynonymMetadata>,
    #[serde(default)]
    pub indexes: Vec<IndexMetadata>,
    #[serde(default)]
    pub object_types: Vec<ObjectType>,
    #[serde(default)]
    pub package_specs: Vec<OraclePackage>,
    #[serde(default)]
    pub package_bodies: Vec<OraclePackage>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    /// Triggers whose body could not be parsed.
    #[serde(default)]
    pub trigger_metadata: Vec<TriggerMetadata>,
}

fn same(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry snapshot from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a registry snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut registry: SchemaRegistry = serde_json::from_str(json)?;
        registry.link_members();
        Ok(registry)
    }

    /// Serialize the registry to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Drop everything, ready for the next run.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Point package and object type members at their owner.
    fn link_members(&mut self) {
        for pkg in self.package_specs.iter_mut().chain(self.package_bodies.iter_mut()) {
            pkg.adopt_members();
        }
        for ty in &mut self.object_types {
            for f in &mut ty.functions {
                f.schema = ty.schema.clone();
                f.parent = Some(ty.name.clone());
            }
            for p in &mut ty.procedures {
                p.schema = ty.schema.clone();
                p.parent = Some(ty.name.clone());
            }
        }
    }

    // -------------------------------------------------------------------------
    // Population
    // -------------------------------------------------------------------------

    pub fn add_table(&mut self, table: TableMetadata) {
        self.tables.push(table);
    }

    pub fn add_view(&mut self, view: ViewMetadata) {
        self.views.push(view);
    }

    pub fn add_synonym(&mut self, synonym: SynonymMetadata) {
        self.synonyms.push(synonym);
    }

    pub fn add_index(&mut self, index: IndexMetadata) {
        self.indexes.push(index);
    }

    pub fn add_object_type(&mut self, mut object_type: ObjectType) {
        for f in &mut object_type.functions {
            f.schema = object_type.schema.clone();
            f.parent = Some(object_type.name.clone());
        }
        for p in &mut object_type.procedures {
            p.schema = object_type.schema.clone();
            p.parent = Some(object_type.name.clone());
        }
        self.object_types.push(object_type);
    }

    pub fn add_package_spec(&mut self, mut package: OraclePackage) {
        package.adopt_members();
        self.package_specs.push(package);
    }

    pub fn add_package_body(&mut self, mut package: OraclePackage) {
        package.adopt_members();
        self.package_bodies.push(package);
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.push(function);
    }

    pub fn add_procedure(&mut self, procedure: Procedure) {
        self.procedures.push(procedure);
    }

    pub fn add_trigger(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
    }

    pub fn add_trigger_metadata(&mut self, trigger: TriggerMetadata) {
        self.trigger_metadata.push(trigger);
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    /// Find a table by schema and name.
    pub fn find_table(&self, schema: &str, name: &str) -> Option<&TableMetadata> {
        self.tables
            .iter()
            .find(|t| same(&t.schema, schema) && same(&t.name, name))
    }

    /// Find a view by schema and name.
    pub fn find_view(&self, schema: &str, name: &str) -> Option<&ViewMetadata> {
        self.views
            .iter()
            .find(|v| same(&v.schema, schema) && same(&v.name, name))
    }

    /// Whether a table or view exists.
    pub fn has_table_or_view(&self, schema: &str, name: &str) -> bool {
        self.find_table(schema, name).is_some() || self.find_view(schema, name).is_some()
    }

    /// Columns of a table, or of a view when no table matches.
    pub fn columns_of(&self, schema: &str, name: &str) -> Option<&[ColumnMetadata]> {
        if let Some(t) = self.find_table(schema, name) {
            return Some(&t.columns);
        }
        self.find_view(schema, name).map(|v| v.columns.as_slice())
    }

    /// Synonyms with the given owner and name, in insertion order.
    pub fn synonyms_named<'a, 'b>(
        &'a self,
        schema: &'b str,
        name: &'b str,
    ) -> impl Iterator<Item = &'a SynonymMetadata> + 'b
    where
        'a: 'b,
    {
        self.synonyms
            .iter()
            .filter(move |s| same(&s.schema, schema) && same(&s.name, name))
    }

    /// First synonym named `name` owned by `schema` or by PUBLIC.
    pub fn find_synonym(&self, schema: &str, name: &str) -> Option<&SynonymMetadata> {
        self.synonyms_named(schema, name)
            .next()
            .or_else(|| self.synonyms_named(PUBLIC_SCHEMA, name).next())
    }

    /// Find an object type by schema and name.
    pub fn find_object_type(&self, schema: &str, name: &str) -> Option<&ObjectType> {
        self.object_types
            .iter()
            .find(|t| same(&t.schema, schema) && same(&t.name, name))
    }

    /// First object type with the given name in any schema.
    pub fn find_object_type_any_schema(&self, name: &str) -> Option<&ObjectType> {
        self.object_types.iter().find(|t| same(&t.name, name))
    }

    /// Find a package specification.
    pub fn find_package_spec(&self, schema: &str, name: &str) -> Option<&OraclePackage> {
        self.package_specs
            .iter()
            .find(|p| same(&p.schema, schema) && same(&p.name, name))
    }

    /// Find a package body.
    pub fn find_package_body(&self, schema: &str, name: &str) -> Option<&OraclePackage> {
        self.package_bodies
            .iter()
            .find(|p| same(&p.schema, schema) && same(&p.name, name))
    }

    /// Whether a package spec or body exists.
    pub fn has_package(&self, schema: &str, name: &str) -> bool {
        self.find_package_spec(schema, name).is_some()
            || self.find_package_body(schema, name).is_some()
    }

    /// Package specs owned by `schema`.
    pub fn package_specs_in<'a, 'b>(
        &'a self,
        schema: &'b str,
    ) -> impl Iterator<Item = &'a OraclePackage> + 'b
    where
        'a: 'b,
    {
        self.package_specs.iter().filter(move |p| same(&p.schema, schema))
    }

    /// Object types owned by `schema`.
    pub fn object_types_in<'a, 'b>(
        &'a self,
        schema: &'b str,
    ) -> impl Iterator<Item = &'a ObjectType> + 'b
    where
        'a: 'b,
    {
        self.object_types.iter().filter(move |t| same(&t.schema, schema))
    }

    /// Standalone functions named `name` in `schema`.
    pub fn standalone_functions<'a, 'b>(
        &'a self,
        schema: &'b str,
        name: &'b str,
    ) -> impl Iterator<Item = &'a Function> + 'b
    where
        'a: 'b,
    {
        self.functions
            .iter()
            .filter(move |f| same(&f.schema, schema) && same(&f.name, name))
    }

    /// Whether a standalone procedure exists.
    pub fn has_standalone_procedure(&self, schema: &str, name: &str) -> bool {
        self.procedures
            .iter()
            .any(|p| same(&p.schema, schema) && same(&p.name, name))
    }

    /// Every constraint paired with its owning table.
    pub fn constraints(&self) -> impl Iterator<Item = (&TableMetadata, &ConstraintMetadata)> {
        self.tables
            .iter()
            .flat_map(|t| t.constraints.iter().map(move |c| (t, c)))
    }

    /// Every function in the registry: standalone, package members and type members.
    pub fn all_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions
            .iter()
            .chain(self.package_specs.iter().flat_map(|p| p.functions.iter()))
            .chain(self.package_bodies.iter().flat_map(|p| p.functions.iter()))
            .chain(self.object_types.iter().flat_map(|t| t.functions.iter()))
    }

    /// Total number of objects, for summaries.
    pub fn object_count(&self) -> usize {
        self.tables.len()
            + self.views.len()
            + self.synonyms.len()
            + self.indexes.len()
            + self.object_types.len()
            + self.package_specs.len()
            + self.package_bodies.len()
            + self.functions.len()
            + self.procedures.len()
            + self.triggers.len()
            + self.trigger_metadata.len()
    }
}
