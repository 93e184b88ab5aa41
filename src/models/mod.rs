//! Data models for the dashboard.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;
pub mod session;

pub use connection::{
    ConnectionInfo, ConnectionSelection, ConnectionTarget, DatabaseType, RemoteCredentials,
    TargetKind,
};
pub use query::{
    ColumnMetadata, DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, MAX_QUERY_TIMEOUT_SECS,
    MAX_ROW_LIMIT, QueryOptions, QueryResult,
};
pub use schema::{ColumnDefinition, ForeignKey, TableInfo, TableSchema, TableType};
pub use session::{ChatMessage, GREETING, MessageRole, Role, Transcript};
