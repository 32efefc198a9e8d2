//! # ora-pg-migrate
//!
//! Oracle to PostgreSQL schema and PL/SQL conversion library.
//!
//! The library works on a fully materialized [`SchemaRegistry`] of extracted
//! Oracle objects and produces PostgreSQL DDL and PL/pgSQL text:
//!
//! - **Symbol resolution** through synonyms, package members, object types
//!   and column references ([`SymbolResolver`])
//! - **Priority-ranked strategies** for tables, constraints, indexes,
//!   triggers, views, packages, functions and procedures ([`strategy`])
//! - **Dependency ordering** of constraints and removal of indexes that
//!   duplicate constraint indexes ([`ordering`])
//! - **Whole-registry conversion** into an ordered migration script
//!   ([`Transformer`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use ora_pg_migrate::{Config, SchemaRegistry, Transformer};
//!
//! fn main() -> ora_pg_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let registry = SchemaRegistry::load(&config.input.registry)?;
//!     let script = Transformer::with_builtins().convert_registry(
//!         &registry,
//!         &config.conversion,
//!         config.output.include_comments,
//!     );
//!     println!("{}", script.to_sql(""));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod identifier;
pub mod model;
pub mod ordering;
pub mod plpgsql;
pub mod resolver;
pub mod strategy;
pub mod transform;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, ConversionConfig};
pub use error::{MigrateError, Result};
pub use model::SchemaRegistry;
pub use resolver::{Scope, SymbolResolver};
pub use strategy::TransformContext;
pub use transform::{ConversionFailure, MigrationScript, Transformer};
