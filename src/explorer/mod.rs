//! Table browsing, summaries and histograms over the embedded database.
//!
//! The catalog is read fresh on every call, so tables created by uploads show
//! up immediately. Table names are resolved against that catalog before any
//! SQL is built.

pub mod histogram;
pub mod stats;

pub use histogram::{BinSpec, Histogram, HistogramBin, MAX_BINS};
pub use stats::{CategoricalSummary, NumericSummary, Summary, numeric_columns, summarize};

use crate::db::{DatabaseSessionProvider, DbHandle};
use crate::error::{DashboardError, DbResult};
use crate::models::{ColumnMetadata, QueryOptions, QueryResult, TableInfo};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

pub const NOTICE_EMPTY_TABLE: &str = "Table is empty; summary and chart skipped.";
pub const NOTICE_NO_NUMERIC: &str = "No numeric columns found for charting.";
pub const NOTICE_NOT_CHARTABLE: &str = "Column values cannot be binned; chart skipped.";

/// Everything the explorer shows for one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    pub table: String,
    pub data: QueryResult,
    pub numeric_columns: Vec<String>,
    pub summary: Option<Summary>,
    pub chart: Option<Histogram>,
    pub notices: Vec<String>,
}

/// Reads tables from the embedded database through the shared handle cache.
#[derive(Clone)]
pub struct TableExplorer {
    provider: Arc<DatabaseSessionProvider>,
}

impl TableExplorer {
    pub fn new(provider: Arc<DatabaseSessionProvider>) -> Self {
        Self { provider }
    }

    async fn handle(&self) -> DbResult<DbHandle> {
        self.provider.get(&self.provider.embedded_target()).await
    }

    /// Current base tables, read from the live catalog.
    pub async fn list_tables(&self) -> DbResult<Vec<TableInfo>> {
        self.handle().await?.list_tables(false).await
    }

    /// Load `table` in full and derive its summary and histogram.
    ///
    /// `column` picks the charted column; it defaults to the first numeric one.
    /// Naming an unknown or non-numeric column is an `InvalidInput` error.
    pub async fn view(&self, table: &str, column: Option<&str>) -> DbResult<TableView> {
        let handle = self.handle().await?;
        let table = handle.resolve_table(table, false).await?;
        let mut data = handle.fetch_table(&table, &QueryOptions::unbounded()).await?;

        if data.columns.is_empty() {
            // Empty results carry no column metadata
            let schema = handle.describe_table(&table).await?;
            data.columns = schema
                .columns
                .iter()
                .map(|c| ColumnMetadata::new(&c.name, &c.data_type))
                .collect();
        }

        if let Some(col) = column
            && data.column_index(col).is_none()
        {
            return Err(DashboardError::invalid_input(format!(
                "Unknown column '{}' in table '{}'",
                col, table
            )));
        }

        debug!(table = %table, rows = data.row_count(), "Loaded table for explorer");
        build_view(table, data, column)
    }
}

/// Derive summary, chart and notices from loaded table contents.
pub fn build_view(table: String, data: QueryResult, column: Option<&str>) -> DbResult<TableView> {
    if data.is_empty() {
        return Ok(TableView {
            table,
            data,
            numeric_columns: Vec::new(),
            summary: None,
            chart: None,
            notices: vec![NOTICE_EMPTY_TABLE.to_string()],
        });
    }

    let numeric = numeric_columns(&data);
    let summary = Some(summarize(&data));
    let mut notices = Vec::new();

    let chart = match column {
        Some(col) if !numeric.iter().any(|n| n == col) => {
            return Err(DashboardError::invalid_input(format!(
                "Column '{}' is not numeric",
                col
            )));
        }
        Some(col) => Some(col),
        None => {
            if numeric.is_empty() {
                notices.push(NOTICE_NO_NUMERIC.to_string());
            }
            numeric.first().map(String::as_str)
        }
    }
    .and_then(|col| {
        let chart = chart_for(&data, col);
        if chart.is_none() {
            notices.push(NOTICE_NOT_CHARTABLE.to_string());
        }
        chart
    });

    Ok(TableView {
        table,
        data,
        numeric_columns: numeric,
        summary,
        chart,
        notices,
    })
}

fn chart_for(data: &QueryResult, column: &str) -> Option<Histogram> {
    let idx = data.column_index(column)?;
    Histogram::build(column, &stats::numeric_values(data, idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(rows: Vec<Vec<serde_json::Value>>) -> QueryResult {
        QueryResult {
            columns: vec![
                ColumnMetadata::new("name", "TEXT"),
                ColumnMetadata::new("marks", "INTEGER"),
            ],
            rows,
            truncated: false,
            execution_time_ms: 1,
        }
    }

    #[test]
    fn test_empty_table_skips_summary_and_chart() {
        let view = build_view("t".into(), data(vec![]), None).unwrap();
        assert!(view.summary.is_none());
        assert!(view.chart.is_none());
        assert_eq!(view.notices, vec![NOTICE_EMPTY_TABLE.to_string()]);
    }

    #[test]
    fn test_default_chart_column_is_first_numeric() {
        let view = build_view(
            "t".into(),
            data(vec![vec![json!("a"), json!(10)], vec![json!("b"), json!(20)]]),
            None,
        )
        .unwrap();
        assert_eq!(view.chart.unwrap().column, "marks");
        assert!(matches!(view.summary, Some(Summary::Numeric(_))));
        assert!(view.notices.is_empty());
    }

    #[test]
    fn test_non_numeric_column_rejected() {
        let err = build_view("t".into(), data(vec![vec![json!("a"), json!(1)]]), Some("name"))
            .unwrap_err();
        assert!(matches!(err, DashboardError::InvalidInput { .. }));
    }

    #[test]
    fn test_tiny_span_charts_one_bin() {
        let data = QueryResult {
            columns: vec![ColumnMetadata::new("x", "REAL")],
            rows: vec![vec![json!(0.0)], vec![json!(1e-323)]],
            truncated: false,
            execution_time_ms: 1,
        };
        let view = build_view("tiny".into(), data, None).unwrap();
        let chart = view.chart.unwrap();
        assert_eq!(chart.bins.len(), 1);
        assert_eq!(chart.total(), 2);
        assert!(view.notices.is_empty());
    }

    #[test]
    fn test_overflowing_span_skips_chart() {
        let data = QueryResult {
            columns: vec![ColumnMetadata::new("x", "REAL")],
            rows: vec![vec![json!(-1.7e308)], vec![json!(1.7e308)]],
            truncated: false,
            execution_time_ms: 1,
        };
        let view = build_view("wide".into(), data, Some("x")).unwrap();
        assert!(view.chart.is_none());
        assert!(matches!(view.summary, Some(Summary::Numeric(_))));
        assert_eq!(view.notices, vec![NOTICE_NOT_CHARTABLE.to_string()]);
    }

    #[test]
    fn test_no_numeric_columns_notice() {
        let view = build_view(
            "t".into(),
            data(vec![vec![json!("a"), json!("x")]]),
            None,
        )
        .unwrap();
        assert!(view.chart.is_none());
        assert_eq!(view.notices, vec![NOTICE_NO_NUMERIC.to_string()]);
        assert!(matches!(view.summary, Some(Summary::Categorical(_))));
    }
}
