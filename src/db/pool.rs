//! Connection pools and the session-facing database handle.
//!
//! Pools are database-specific (`MySqlPool`, `SqlitePool`) to keep full type
//! support. A [`DbHandle`] wraps one pool and only exposes read queries and
//! schema introspection.

use crate::config::PoolOptions;
use crate::db::executor::QueryExecutor;
use crate::db::schema::{SchemaInspector, quote_identifier};
use crate::db::sql_validator::validate_readonly;
use crate::error::{DashboardError, DbResult};
use crate::models::{
    ConnectionInfo, ConnectionTarget, DatabaseType, QueryOptions, QueryResult, RemoteCredentials,
    TableInfo, TableSchema,
};
use sqlx::{
    MySqlPool, SqlitePool, mysql::MySqlConnectOptions, mysql::MySqlPoolOptions,
    sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::SQLite(pool) => pool.close().await,
        }
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySQL,
            DbPool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Open a pool for the given target.
    pub async fn connect(target: &ConnectionTarget, pool_opts: &PoolOptions) -> DbResult<Self> {
        match target {
            ConnectionTarget::Embedded(path) => connect_sqlite(path, pool_opts).await,
            ConnectionTarget::Remote(creds) => connect_mysql(creds, pool_opts).await,
        }
    }

    /// Get the server version from the connected database.
    pub async fn server_version(&self) -> Option<String> {
        let result = match self {
            DbPool::MySql(pool) => {
                sqlx::query_scalar::<_, String>("SELECT version()")
                    .fetch_one(pool)
                    .await
            }
            DbPool::SQLite(pool) => {
                sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
                    .fetch_one(pool)
                    .await
            }
        };
        match result {
            Ok(version) => {
                debug!(version = %version, "Got server version");
                Some(version)
            }
            Err(e) => {
                warn!(error = %e, "Failed to get server version");
                None
            }
        }
    }
}

/// The embedded file is opened read-write but never created here; a missing
/// file means the seeder has not been run.
async fn connect_sqlite(path: &Path, pool_opts: &PoolOptions) -> DbResult<DbPool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(false)
        .create_if_missing(false);

    let pool = SqlitePoolOptions::new()
        .max_connections(pool_opts.max_connections_for(true))
        .acquire_timeout(pool_opts.connect_timeout)
        .idle_timeout(Some(pool_opts.idle_timeout))
        .connect_with(options)
        .await
        .map_err(|e| {
            DashboardError::connection(
                format!("Failed to open {}: {}", path.display(), e),
                connection_suggestion(DatabaseType::SQLite, &e),
            )
        })?;
    Ok(DbPool::SQLite(pool))
}

async fn connect_mysql(creds: &RemoteCredentials, pool_opts: &PoolOptions) -> DbResult<DbPool> {
    let (host, port) = creds.host_and_port()?;
    let options = MySqlConnectOptions::new()
        .host(host)
        .port(port)
        .username(creds.user())
        .password(creds.password())
        .database(creds.database())
        .charset("utf8mb4");

    let pool = MySqlPoolOptions::new()
        .max_connections(pool_opts.max_connections_for(false))
        .acquire_timeout(pool_opts.connect_timeout)
        .idle_timeout(Some(pool_opts.idle_timeout))
        .connect_with(options)
        .await
        .map_err(|e| {
            DashboardError::connection(
                format!("Failed to connect: {}", e),
                connection_suggestion(DatabaseType::MySQL, &e),
            )
        })?;
    Ok(DbPool::MySql(pool))
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(db_type: DatabaseType, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("access denied")
        || error_str.contains("authentication")
        || error_str.contains("password")
    {
        return "Verify the username and password".to_string();
    }

    if error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    match db_type {
        DatabaseType::MySQL => "Verify the host, port and credentials".to_string(),
        DatabaseType::SQLite => {
            "Verify the database file exists (run seed-demo-db to create it)".to_string()
        }
    }
}

/// Opaque, cloneable handle to one database.
///
/// Only read queries and introspection are reachable through it; every SQL
/// string is validated as read-only before it is sent.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    pool: DbPool,
    target: ConnectionTarget,
    server_version: Option<String>,
    executor: QueryExecutor,
}

impl DbHandle {
    pub fn new(
        pool: DbPool,
        target: ConnectionTarget,
        server_version: Option<String>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                pool,
                target,
                server_version,
                executor: QueryExecutor::new(query_timeout),
            }),
        }
    }

    /// Connect to `target` and wrap the pool in a handle.
    pub async fn open(
        target: &ConnectionTarget,
        pool_opts: &PoolOptions,
        query_timeout: Duration,
    ) -> DbResult<Self> {
        info!(db_target = %target.describe(), "Connecting to database");
        let pool = DbPool::connect(target, pool_opts).await?;
        let server_version = pool.server_version().await;
        info!(
            db_target = %target.describe(),
            server_version = ?server_version,
            "Connected successfully"
        );
        Ok(Self::new(pool, target.clone(), server_version, query_timeout))
    }

    pub fn db_type(&self) -> DatabaseType {
        self.inner.pool.db_type()
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.inner.target
    }

    pub fn server_version(&self) -> Option<&str> {
        self.inner.server_version.as_deref()
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            kind: self.inner.target.kind(),
            database_type: self.db_type(),
            target: self.inner.target.describe(),
            server_version: self.inner.server_version.clone(),
        }
    }

    /// Validate `sql` as read-only, then run it.
    pub async fn run_read_query(&self, sql: &str, options: &QueryOptions) -> DbResult<QueryResult> {
        validate_readonly(sql, self.db_type())?;
        self.inner
            .executor
            .fetch(&self.inner.pool, sql, options)
            .await
    }

    pub async fn list_tables(&self, include_views: bool) -> DbResult<Vec<TableInfo>> {
        SchemaInspector::list_tables(&self.inner.pool, include_views).await
    }

    pub async fn describe_table(&self, table_name: &str) -> DbResult<TableSchema> {
        SchemaInspector::describe_table(&self.inner.pool, table_name).await
    }

    /// Resolve `name` against the live catalog. Unknown names are rejected, so
    /// the returned name is safe to quote into SQL.
    pub async fn resolve_table(&self, name: &str, include_views: bool) -> DbResult<String> {
        self.list_tables(include_views)
            .await?
            .into_iter()
            .find(|t| t.name == name)
            .map(|t| t.name)
            .ok_or_else(|| DashboardError::invalid_input(format!("Unknown table '{}'", name)))
    }

    /// Every row of a catalog table, in storage order.
    pub async fn fetch_table(&self, table_name: &str, options: &QueryOptions) -> DbResult<QueryResult> {
        let name = self.resolve_table(table_name, true).await?;
        let sql = format!("SELECT * FROM {}", quote_identifier(&name, self.db_type()));
        self.run_read_query(&sql, options).await
    }

    pub(crate) async fn close(&self) {
        self.inner.pool.close().await;
    }
}

impl std::fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHandle")
            .field("target", &self.inner.target.describe())
            .field("db_type", &self.db_type())
            .field("server_version", &self.inner.server_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn seeded_file() -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(true),
        )
        .await
        .unwrap();
        sqlx::query("CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO items (label) VALUES ('a'), ('b')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
        (dir, path)
    }

    #[tokio::test]
    async fn test_missing_embedded_file_is_not_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.db");
        let target = ConnectionTarget::embedded(&path);
        let err = DbHandle::open(&target, &PoolOptions::default(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Connection { .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_handle_rejects_writes() {
        let (_dir, path) = seeded_file().await;
        let handle = DbHandle::open(
            &ConnectionTarget::embedded(&path),
            &PoolOptions::default(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let err = handle
            .run_read_query("DELETE FROM items", &QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Permission { .. }));

        let result = handle
            .run_read_query("SELECT COUNT(*) AS n FROM items", &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(result.rows[0][0], serde_json::json!(2));
        assert_eq!(handle.db_type(), DatabaseType::SQLite);
        assert!(handle.server_version().is_some());
    }

    #[tokio::test]
    async fn test_fetch_table_rejects_unknown_names() {
        let (_dir, path) = seeded_file().await;
        let handle = DbHandle::open(
            &ConnectionTarget::embedded(&path),
            &PoolOptions::default(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let result = handle
            .fetch_table("items", &QueryOptions::unbounded())
            .await
            .unwrap();
        assert_eq!(result.row_count(), 2);

        let err = handle
            .fetch_table("items; DROP TABLE items", &QueryOptions::unbounded())
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::InvalidInput { .. }));
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = RemoteCredentials::new("h", "u", "hunter2", "d").unwrap();
        let target = ConnectionTarget::Remote(creds);
        assert!(!target.describe().contains("hunter2"));
    }
}
