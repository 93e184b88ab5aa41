//! Role-gated CSV upload into the embedded database.
//!
//! An upload **replaces** any existing table of the same name: the old table is
//! dropped, recreated from the CSV header and filled, all in one transaction.
//! Writes go through a fresh connection that is closed afterwards; memoised
//! session handles are never written through.

use crate::error::{DashboardError, DbResult};
use crate::ingest::csv::{CellValue, ColumnType, CsvTable};
use crate::models::Role;
use humansize::{DECIMAL, format_size};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_UPLOAD_TABLE: &str = "uploaded_table";

/// An upload as submitted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadRequest {
    pub file_name: Option<String>,
    /// Raw CSV text of the file.
    pub csv: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub confirm: bool,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, csv: impl Into<String>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            csv: Some(csv.into()),
            table_name: None,
            confirm: false,
        }
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn confirmed(mut self) -> Self {
        self.confirm = true;
        self
    }

    /// Requested table name, falling back to the default when blank.
    pub fn target_table(&self) -> &str {
        self.table_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_UPLOAD_TABLE)
    }
}

/// Why an upload did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotAdmin,
    NoFile,
    NotCsv,
    NotConfirmed,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::NotAdmin => "uploads require the admin role",
            SkipReason::NoFile => "no file was provided",
            SkipReason::NotCsv => "only .csv files can be uploaded",
            SkipReason::NotConfirmed => "upload was not confirmed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedColumn {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Created {
        table: String,
        rows: usize,
        columns: Vec<UploadedColumn>,
    },
    Skipped {
        reason: SkipReason,
        message: String,
    },
}

impl UploadOutcome {
    fn skipped(reason: SkipReason) -> Self {
        UploadOutcome::Skipped {
            reason,
            message: reason.to_string(),
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UploadOutcome::Created { .. })
    }
}

/// Creates (or replaces) tables in the embedded file from uploaded CSVs.
#[derive(Debug, Clone)]
pub struct TableUploader {
    embedded_path: PathBuf,
}

impl TableUploader {
    pub fn new(embedded_path: impl Into<PathBuf>) -> Self {
        Self {
            embedded_path: embedded_path.into(),
        }
    }

    pub fn embedded_path(&self) -> &Path {
        &self.embedded_path
    }

    /// Materialise `request` as a table when every precondition holds.
    ///
    /// Unmet preconditions are reported as [`UploadOutcome::Skipped`] and
    /// nothing is written. The role is checked before anything else.
    pub async fn create_table(&self, role: Role, request: UploadRequest) -> DbResult<UploadOutcome> {
        if !role.can_write() {
            debug!(?role, "Upload skipped: role cannot write");
            return Ok(UploadOutcome::skipped(SkipReason::NotAdmin));
        }

        let (Some(file_name), Some(csv)) = (request.file_name.as_deref(), request.csv.as_deref())
        else {
            return Ok(UploadOutcome::skipped(SkipReason::NoFile));
        };
        if !is_csv_file_name(file_name) {
            return Ok(UploadOutcome::skipped(SkipReason::NotCsv));
        }
        if !request.confirm {
            return Ok(UploadOutcome::skipped(SkipReason::NotConfirmed));
        }

        let table_name = request.target_table();
        validate_table_name(table_name)?;
        debug!(
            file = %file_name,
            size = %format_size(csv.len(), DECIMAL),
            table = %table_name,
            "Parsing uploaded CSV"
        );
        let table = CsvTable::parse(csv)?;

        self.write_table(role, table_name, &table).await
    }

    async fn write_table(
        &self,
        role: Role,
        table_name: &str,
        table: &CsvTable,
    ) -> DbResult<UploadOutcome> {
        if !role.can_write() {
            return Err(DashboardError::permission(
                "CREATE TABLE",
                "uploads require the admin role",
            ));
        }

        let types = table.column_types();
        let quoted = quote(table_name);
        let column_defs: Vec<String> = table
            .headers()
            .iter()
            .zip(&types)
            .map(|(name, ty)| format!("{} {}", quote(name), ty.sql_type()))
            .collect();
        let create_sql = format!("CREATE TABLE {} ({})", quoted, column_defs.join(", "));
        let placeholders = vec!["?"; types.len()].join(", ");
        let insert_sql = format!("INSERT INTO {} VALUES ({})", quoted, placeholders);

        // Replacement semantics: dependants of a replaced table are left as-is.
        let options = SqliteConnectOptions::new()
            .filename(&self.embedded_path)
            .create_if_missing(true)
            .foreign_keys(false);
        let mut conn = SqliteConnection::connect_with(&options).await?;

        let result = insert_all(&mut conn, &quoted, &create_sql, &insert_sql, table, &types).await;
        conn.close().await?;
        result?;

        info!(
            table = %table_name,
            rows = table.row_count(),
            columns = types.len(),
            "Uploaded table created"
        );

        Ok(UploadOutcome::Created {
            table: table_name.to_string(),
            rows: table.row_count(),
            columns: table
                .headers()
                .iter()
                .zip(types)
                .map(|(name, column_type)| UploadedColumn {
                    name: name.clone(),
                    column_type,
                })
                .collect(),
        })
    }
}

async fn insert_all(
    conn: &mut SqliteConnection,
    quoted_table: &str,
    create_sql: &str,
    insert_sql: &str,
    table: &CsvTable,
    types: &[ColumnType],
) -> DbResult<()> {
    let mut tx = conn.begin().await?;
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quoted_table))
        .execute(&mut *tx)
        .await?;
    sqlx::query(create_sql).execute(&mut *tx).await?;

    for row in table.typed_rows(types) {
        let mut query = sqlx::query(insert_sql);
        for cell in row {
            query = match cell {
                CellValue::Null => query.bind(None::<String>),
                CellValue::Integer(v) => query.bind(v),
                CellValue::Real(v) => query.bind(v),
                CellValue::Text(v) => query.bind(v),
            };
        }
        query.execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}

fn is_csv_file_name(name: &str) -> bool {
    Path::new(name.trim())
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn validate_table_name(name: &str) -> DbResult<()> {
    if name
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("sqlite_"))
    {
        return Err(DashboardError::invalid_input(format!(
            "Table name '{}' is reserved",
            name
        )));
    }
    Ok(())
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ROSTER: &str = "name,grade\nAda,90\nLinus,85\nGrace,99\n";

    #[test]
    fn test_csv_extension_check() {
        assert!(is_csv_file_name("roster.csv"));
        assert!(is_csv_file_name("ROSTER.CSV"));
        assert!(!is_csv_file_name("roster.xlsx"));
        assert!(!is_csv_file_name("csv"));
    }

    #[test]
    fn test_target_table_defaults() {
        let request = UploadRequest::new("a.csv", ROSTER);
        assert_eq!(request.target_table(), DEFAULT_UPLOAD_TABLE);
        let request = request.with_table_name("   ");
        assert_eq!(request.target_table(), DEFAULT_UPLOAD_TABLE);
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }

    #[tokio::test]
    async fn test_skip_order_checks_role_first() {
        let dir = TempDir::new().unwrap();
        let uploader = TableUploader::new(dir.path().join("u.db"));

        let outcome = uploader
            .create_table(Role::ReadOnly, UploadRequest::default())
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::skipped(SkipReason::NotAdmin));

        let outcome = uploader
            .create_table(Role::Admin, UploadRequest::default())
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::skipped(SkipReason::NoFile));

        let outcome = uploader
            .create_table(Role::Admin, UploadRequest::new("r.txt", ROSTER).confirmed())
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::skipped(SkipReason::NotCsv));

        let outcome = uploader
            .create_table(Role::Admin, UploadRequest::new("r.csv", ROSTER))
            .await
            .unwrap();
        assert_eq!(outcome, UploadOutcome::skipped(SkipReason::NotConfirmed));
        assert!(!dir.path().join("u.db").exists());
    }

    #[tokio::test]
    async fn test_write_path_rechecks_role() {
        let dir = TempDir::new().unwrap();
        let uploader = TableUploader::new(dir.path().join("u.db"));
        let table = CsvTable::parse(ROSTER).unwrap();

        let err = uploader
            .write_table(Role::ReadOnly, "roster", &table)
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Permission { .. }));
        assert!(!dir.path().join("u.db").exists());
    }

    #[tokio::test]
    async fn test_reserved_name_rejected() {
        let dir = TempDir::new().unwrap();
        let uploader = TableUploader::new(dir.path().join("u.db"));
        let request = UploadRequest::new("r.csv", ROSTER)
            .with_table_name("sqlite_master")
            .confirmed();
        let err = uploader.create_table(Role::Admin, request).await.unwrap_err();
        assert!(matches!(err, DashboardError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_create_then_replace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("u.db");
        let uploader = TableUploader::new(&path);

        let request = UploadRequest::new("roster.csv", ROSTER)
            .with_table_name("roster")
            .confirmed();
        let outcome = uploader.create_table(Role::Admin, request).await.unwrap();
        match outcome {
            UploadOutcome::Created { table, rows, columns } => {
                assert_eq!(table, "roster");
                assert_eq!(rows, 3);
                assert_eq!(columns[1].column_type, ColumnType::Integer);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let request = UploadRequest::new("roster.csv", "id\n1\n")
            .with_table_name("roster")
            .confirmed();
        uploader.create_table(Role::Admin, request).await.unwrap();

        let mut conn = SqliteConnection::connect_with(&SqliteConnectOptions::new().filename(&path))
            .await
            .unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roster")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(count, 1);
        conn.close().await.unwrap();
    }
}
