//! Constraint ordering and index deduplication.
//!
//! Foreign keys need the primary key or unique constraint they reference to
//! exist, so constraints are applied primary keys first, then unique, check
//! and finally foreign keys. PostgreSQL creates an index for every primary key
//! and unique constraint; Oracle indexes covering exactly the same columns
//! are dropped from the index DDL.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::model::{ConstraintKind, ConstraintMetadata, IndexMetadata, SchemaRegistry, TableMetadata};

/// Constraints in application order: PRIMARY KEY, UNIQUE, CHECK, FOREIGN KEY.
///
/// The sort is stable, so constraints of the same kind keep their order.
pub fn order_constraints(constraints: &[ConstraintMetadata]) -> Vec<&ConstraintMetadata> {
    let mut ordered: Vec<&ConstraintMetadata> = constraints.iter().collect();
    ordered.sort_by_key(|c| c.kind.apply_order());
    ordered
}

/// Every constraint of the registry with its table, in application order.
pub fn ordered_registry_constraints(
    registry: &SchemaRegistry,
) -> Vec<(&TableMetadata, &ConstraintMetadata)> {
    let mut ordered: Vec<_> = registry.constraints().collect();
    ordered.sort_by_key(|(_, c)| c.kind.apply_order());

    let count = |kind: ConstraintKind| ordered.iter().filter(|(_, c)| c.kind == kind).count();
    info!(
        "Ordered {} constraints: {} primary keys, {} unique, {} check, {} foreign keys",
        ordered.len(),
        count(ConstraintKind::PrimaryKey),
        count(ConstraintKind::Unique),
        count(ConstraintKind::Check),
        count(ConstraintKind::ForeignKey)
    );
    ordered
}

/// `schema.table:col1,col2` with lowercased names and sorted columns.
pub fn index_signature<'c>(
    schema: &str,
    table: &str,
    columns: impl IntoIterator<Item = &'c str>,
) -> String {
    let mut cols: Vec<String> = columns
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_lowercase)
        .collect();
    cols.sort();
    format!(
        "{}.{}:{}",
        schema.to_lowercase(),
        table.to_lowercase(),
        cols.join(",")
    )
}

/// Signatures of the indexes PostgreSQL creates for primary key and unique constraints.
pub fn constraint_index_signatures(registry: &SchemaRegistry) -> HashSet<String> {
    registry
        .constraints()
        .filter(|(_, c)| c.kind.creates_index())
        .map(|(table, c)| {
            let signature = index_signature(&table.schema, &table.name, c.columns.iter().map(String::as_str));
            debug!("Constraint {} creates index {}", c.name, signature);
            signature
        })
        .collect()
}

/// Indexes that do not duplicate a constraint-generated index.
pub fn filter_conflicting_indexes<'i>(
    indexes: &'i [IndexMetadata],
    registry: &SchemaRegistry,
) -> Vec<&'i IndexMetadata> {
    let signatures = constraint_index_signatures(registry);
    if signatures.is_empty() {
        return indexes.iter().collect();
    }

    indexes
        .iter()
        .filter(|index| {
            let signature = index_signature(&index.schema, &index.table, index.column_names());
            let conflicts = signatures.contains(&signature);
            if conflicts {
                debug!(
                    "Filtering out index {} - conflicts with constraint-generated index",
                    index.name
                );
            }
            !conflicts
        })
        .collect()
}
