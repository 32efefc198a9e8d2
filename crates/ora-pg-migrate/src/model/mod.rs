//! Data model: dictionary metadata, parsed PL/SQL and the registry holding both.

pub mod metadata;
pub mod plsql;
pub mod registry;

pub use metadata::*;
pub use plsql::*;
pub use registry::{SchemaRegistry, PUBLIC_SCHEMA};
