//! Database layer.
//!
//! - Connection pools and the read-only session handle
//! - Memoised handles keyed by connection target
//! - Query execution and row decoding
//! - Schema introspection
//! - Read-only SQL validation
//! - Demo schema seeding

pub mod executor;
pub mod pool;
pub mod provider;
pub mod schema;
pub mod seed;
pub mod sql_validator;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::{DbHandle, DbPool};
pub use provider::DatabaseSessionProvider;
pub use schema::{SchemaInspector, quote_identifier};
pub use seed::{SeedReport, seed, seed_file};
pub use sql_validator::validate_readonly;
