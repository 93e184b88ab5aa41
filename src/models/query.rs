//! Query-related data models.
//!
//! Results keep rows positional so that duplicate column names and column
//! order survive the trip to the UI.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default row limit for query results.
pub const DEFAULT_ROW_LIMIT: u32 = 100;

/// Maximum allowed row limit.
pub const MAX_ROW_LIMIT: u32 = 10000;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u32 = 30;

/// Maximum query timeout in seconds.
pub const MAX_QUERY_TIMEOUT_SECS: u32 = 300;

/// Options for a single read query.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Default: 100, max: 10000
    #[serde(default)]
    pub limit: Option<u32>,
    /// Default: 30, max: 300
    #[serde(default)]
    pub timeout_secs: Option<u32>,
}

impl QueryOptions {
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u32) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Fetch every row. Used by the explorer, which loads whole tables.
    pub fn unbounded() -> Self {
        Self {
            limit: Some(u32::MAX),
            timeout_secs: None,
        }
    }

    /// Get the effective row limit (with bounds checking).
    pub fn effective_limit(&self) -> u32 {
        match self.limit {
            Some(u32::MAX) => u32::MAX,
            Some(l) => l.clamp(1, MAX_ROW_LIMIT),
            None => DEFAULT_ROW_LIMIT,
        }
    }

    /// Get the effective timeout (with bounds checking).
    pub fn effective_timeout(&self) -> u32 {
        self.timeout_secs
            .map(|t| t.clamp(1, MAX_QUERY_TIMEOUT_SECS))
            .unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Database-specific type (e.g., "INTEGER", "varchar", "TEXT")
    pub type_name: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    /// One entry per row, values in column order.
    pub rows: Vec<Vec<JsonValue>>,
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn empty(columns: Vec<ColumnMetadata>, execution_time_ms: u64) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            truncated: false,
            execution_time_ms,
        }
    }

    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &JsonValue> {
        self.rows.iter().filter_map(move |row| row.get(index))
    }
}
