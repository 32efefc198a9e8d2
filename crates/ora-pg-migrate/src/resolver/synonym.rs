//! Synonym following.
//!
//! One iterative walker serves every object kind. It keeps a visited set and a
//! depth counter so cyclic or very long synonym chains stop with
//! [`MigrateError::RecursionLimit`] instead of looping.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::model::{SynonymMetadata, PUBLIC_SCHEMA};

use super::SymbolResolver;

/// Kind of object a synonym lookup must land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    TableOrView,
    ObjectType,
    Package,
}

impl ObjectKind {
    /// Label used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::TableOrView => "table or view",
            ObjectKind::ObjectType => "object type",
            ObjectKind::Package => "package",
        }
    }

    /// `ALL_SYNONYMS` object type tags that may point at this kind.
    fn accepts_tag(&self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || tag.eq_ignore_ascii_case("SYNONYM") {
            return true;
        }
        match self {
            ObjectKind::TableOrView => {
                tag.eq_ignore_ascii_case("TABLE") || tag.eq_ignore_ascii_case("VIEW")
            }
            ObjectKind::ObjectType => tag.eq_ignore_ascii_case("TYPE"),
            ObjectKind::Package => tag.eq_ignore_ascii_case("PACKAGE"),
        }
    }
}

/// A resolved `(schema, name)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub schema: String,
    pub name: String,
}

impl ResolvedName {
    fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
        }
    }
}

/// Outcome of following synonyms from a starting name.
#[derive(Debug, Clone, PartialEq)]
pub enum SynonymResolution<'a> {
    /// The name, or the end of its synonym chain, exists.
    Found(ResolvedName),
    /// Neither the object nor a synonym for it exists.
    NotFound,
    /// The chain ends at an object that does not exist.
    Dangling(&'a SynonymMetadata),
    /// More than one synonym matched at some step of the chain.
    Multiple(Vec<&'a SynonymMetadata>),
}

impl<'a> SymbolResolver<'a> {
    /// The object of `kind` stored at `schema.name`, in its registry spelling.
    pub(crate) fn locate(&self, kind: ObjectKind, schema: &str, name: &str) -> Option<ResolvedName> {
        let registry = self.registry();
        match kind {
            ObjectKind::TableOrView => registry
                .find_table(schema, name)
                .map(|t| ResolvedName::new(&t.schema, &t.name))
                .or_else(|| {
                    registry
                        .find_view(schema, name)
                        .map(|v| ResolvedName::new(&v.schema, &v.name))
                }),
            ObjectKind::ObjectType => registry
                .find_object_type(schema, name)
                .map(|t| ResolvedName::new(&t.schema, &t.name)),
            ObjectKind::Package => registry
                .find_package_spec(schema, name)
                .map(|p| ResolvedName::new(&p.schema, &p.name)),
        }
    }

    /// Synonyms named `name` in `schema` that may point at `kind`.
    ///
    /// With `include_public`, PUBLIC synonyms are considered only when the
    /// owning schema has none.
    fn synonym_candidates(
        &self,
        kind: ObjectKind,
        schema: &str,
        name: &str,
        include_public: bool,
    ) -> Vec<&'a SynonymMetadata> {
        let registry = self.registry();
        let owned: Vec<&SynonymMetadata> = registry
            .synonyms_named(schema, name)
            .filter(|s| kind.accepts_tag(&s.referenced_type))
            .collect();
        if !owned.is_empty() || !include_public || schema.eq_ignore_ascii_case(PUBLIC_SCHEMA) {
            return owned;
        }
        registry
            .synonyms_named(PUBLIC_SCHEMA, name)
            .filter(|s| kind.accepts_tag(&s.referenced_type))
            .collect()
    }

    /// Follow synonyms from `schema.name` until an existing object of `kind` is reached.
    pub fn follow_synonyms(
        &self,
        kind: ObjectKind,
        schema: &str,
        name: &str,
        include_public: bool,
    ) -> Result<SynonymResolution<'a>> {
        if let Some(found) = self.locate(kind, schema, name) {
            return Ok(SynonymResolution::Found(found));
        }

        let mut visited: HashSet<(String, String)> = HashSet::new();
        visited.insert((schema.to_uppercase(), name.to_uppercase()));

        let mut current = ResolvedName::new(schema, name);
        let mut last: Option<&'a SynonymMetadata> = None;
        let mut depth = 0usize;

        loop {
            let candidates =
                self.synonym_candidates(kind, &current.schema, &current.name, include_public);

            let synonym = match candidates.as_slice() {
                [] => {
                    return Ok(match last {
                        Some(s) => SynonymResolution::Dangling(s),
                        None => SynonymResolution::NotFound,
                    })
                }
                [only] => *only,
                _ => return Ok(SynonymResolution::Multiple(candidates)),
            };

            depth += 1;
            if depth > self.max_depth() {
                return Err(MigrateError::RecursionLimit {
                    name: format!("{}.{}", schema, name),
                    depth: self.max_depth(),
                });
            }

            let key = (
                synonym.referenced_schema.to_uppercase(),
                synonym.referenced_name.to_uppercase(),
            );
            if !visited.insert(key) {
                return Err(MigrateError::RecursionLimit {
                    name: format!("{}.{}", schema, name),
                    depth,
                });
            }

            debug!(
                "Synonym {}.{} -> {}.{}",
                synonym.schema, synonym.name, synonym.referenced_schema, synonym.referenced_name
            );

            if let Some(found) =
                self.locate(kind, &synonym.referenced_schema, &synonym.referenced_name)
            {
                return Ok(SynonymResolution::Found(found));
            }
            current = ResolvedName::new(&synonym.referenced_schema, &synonym.referenced_name);
            last = Some(synonym);
        }
    }

    /// Resolve an object type or package name through synonyms owned by `schema`.
    ///
    /// Returns `Ok(None)` when neither the object nor a synonym exists. A
    /// synonym pointing at a missing object, or several matching synonyms,
    /// is an [`MigrateError::AmbiguousReference`].
    pub fn resolve_schema_and_name(
        &self,
        name: &str,
        schema: &str,
        kind: ObjectKind,
    ) -> Result<Option<ResolvedName>> {
        match self.follow_synonyms(kind, schema, name, false)? {
            SynonymResolution::Found(resolved) => Ok(Some(resolved)),
            SynonymResolution::NotFound => Ok(None),
            SynonymResolution::Dangling(s) => Err(MigrateError::ambiguous(
                name,
                schema,
                format!(
                    "synonym points to non-existent {}: {}.{}",
                    kind.label(),
                    s.referenced_schema,
                    s.referenced_name
                ),
            )),
            SynonymResolution::Multiple(_) => Err(MigrateError::ambiguous(
                name,
                schema,
                format!("Multiple synonyms found for {}", kind.label()),
            )),
        }
    }
}
