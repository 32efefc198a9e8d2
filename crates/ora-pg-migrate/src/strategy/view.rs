//! View strategies.
//!
//! Views are emitted twice. The placeholder pass selects typed NULLs so that
//! routines and other views depending on the view compile before its query
//! is available; the full pass replaces it with the converted query.

use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::identifier::{pg_identifier, qualify};
use crate::model::ViewMetadata;
use crate::plpgsql::{rewrite_sql_text, PlpgsqlRenderer};
use crate::typemap;

use super::{Strategy, StrategyRegistry, TransformContext};

pub trait ViewStrategy: Strategy {
    fn supports(&self, view: &ViewMetadata) -> bool;

    /// View selecting `NULL::type` for every column.
    fn transform_empty(&self, view: &ViewMetadata, ctx: &TransformContext<'_>) -> Result<String>;

    /// View with its converted query.
    fn transform(&self, view: &ViewMetadata, ctx: &TransformContext<'_>) -> Result<String>;

    fn conversion_notes(&self, view: &ViewMetadata) -> String;
}

pub type ViewRegistry = StrategyRegistry<dyn ViewStrategy>;

impl StrategyRegistry<dyn ViewStrategy> {
    pub fn with_builtins() -> Self {
        let mut registry = Self::new("view");
        registry.register(Box::new(BasicViewStrategy));
        registry
    }

    pub fn select(&self, view: &ViewMetadata) -> Option<&dyn ViewStrategy> {
        self.select_where(|s| s.supports(view))
    }

    pub fn transform_empty(&self, view: &ViewMetadata, ctx: &TransformContext<'_>) -> Result<String> {
        self.apply(
            &view.full_name(),
            |s| s.supports(view),
            |s| s.transform_empty(view, ctx),
        )
    }

    pub fn transform(&self, view: &ViewMetadata, ctx: &TransformContext<'_>) -> Result<String> {
        self.apply(
            &view.full_name(),
            |s| s.supports(view),
            |s| s.transform(view, ctx),
        )
    }

    pub fn conversion_notes(&self, view: &ViewMetadata) -> Option<String> {
        self.select(view).map(|s| s.conversion_notes(view))
    }
}

/// Any view with a known column list.
pub struct BasicViewStrategy;

impl BasicViewStrategy {
    fn header(view: &ViewMetadata) -> String {
        let columns: Vec<String> = view.columns.iter().map(|c| pg_identifier(&c.name)).collect();
        format!(
            "CREATE OR REPLACE VIEW {} ({}) AS\n",
            qualify(&view.schema, &view.name),
            columns.join(", ")
        )
    }
}

impl Strategy for BasicViewStrategy {
    fn name(&self) -> &'static str {
        "Basic View Strategy"
    }

    fn priority(&self) -> i32 {
        10
    }
}

impl ViewStrategy for BasicViewStrategy {
    fn supports(&self, view: &ViewMetadata) -> bool {
        !view.columns.is_empty()
    }

    fn transform_empty(&self, view: &ViewMetadata, _ctx: &TransformContext<'_>) -> Result<String> {
        let placeholders: Vec<String> = view
            .columns
            .iter()
            .map(|c| {
                format!(
                    "NULL::{} AS {}",
                    typemap::column_to_postgres(&c.data_type, c.length, c.precision, c.scale),
                    pg_identifier(&c.name)
                )
            })
            .collect();
        Ok(format!("{}SELECT {};", Self::header(view), placeholders.join(", ")))
    }

    fn transform(&self, view: &ViewMetadata, ctx: &TransformContext<'_>) -> Result<String> {
        let query = match &view.query {
            Some(query) => {
                debug!("Rendering view {} from parsed query", view.full_name());
                PlpgsqlRenderer::new(ctx.resolver, &view.schema).select(query)
            }
            None => {
                let raw = view.raw_query.trim().trim_end_matches(';').trim_end();
                if raw.is_empty() {
                    return Err(MigrateError::unsupported(
                        view.full_name(),
                        "view has no query text",
                    ));
                }
                debug!("Rewriting view {} from query text", view.full_name());
                rewrite_sql_text(raw, false)
            }
        };
        Ok(format!("{}{};", Self::header(view), query))
    }

    fn conversion_notes(&self, _view: &ViewMetadata) -> String {
        "Converted using basic strategy".to_string()
    }
}
