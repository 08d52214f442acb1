//! Storage layer for the science file catalog.
//!
//! Provides:
//! - `Catalog`: the session factory (pool + mission-namespaced table names)
//! - Schema generation for a configurable number of instrument slots
//! - Reference table seeding and reads
//! - Science product, science file and status row operations

pub mod catalog;
pub mod records;
pub mod reference;
pub mod schema;
mod seed;

pub use catalog::{Catalog, CatalogTx};
pub use records::{
    NewScienceFile, NewStatus, ScienceFileRecord, ScienceProductRecord, StatusRecord,
};
pub use schema::{ColumnInfo, SchemaBuilder, TableNames};
