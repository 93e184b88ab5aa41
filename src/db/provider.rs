//! Memoised database handles.
//!
//! # Design
//!
//! - **`OnceCell` per target**: concurrent first lookups for one target share a
//!   single connect (single-flight).
//! - **Expiry on lookup**: an entry older than the TTL is evicted when it is next
//!   requested and a fresh handle is built in its place. There is no background
//!   sweeper.
//! - **Close outside the lock**: evicted pools are closed on a spawned task so a
//!   lookup never waits on a pool shutdown.
//!
//! Removals compare cells with `Arc::ptr_eq`, so a racing lookup that already
//! replaced an entry is never clobbered.

use crate::config::PoolOptions;
use crate::db::pool::DbHandle;
use crate::error::{DashboardError, DbResult};
use crate::models::{ConnectionSelection, ConnectionTarget};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};

struct HandleEntry {
    handle: DbHandle,
    created_at: Instant,
}

impl HandleEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

type HandleCell = Arc<OnceCell<HandleEntry>>;

/// Hands out database handles keyed by connection target.
pub struct DatabaseSessionProvider {
    embedded_path: PathBuf,
    pool_options: PoolOptions,
    query_timeout: Duration,
    ttl: Duration,
    handles: RwLock<HashMap<ConnectionTarget, HandleCell>>,
}

impl DatabaseSessionProvider {
    pub fn new(
        embedded_path: PathBuf,
        pool_options: PoolOptions,
        query_timeout: Duration,
        ttl: Duration,
    ) -> Self {
        Self {
            embedded_path,
            pool_options,
            query_timeout,
            ttl,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Absolute path of the embedded SQLite file.
    pub fn embedded_path(&self) -> &Path {
        &self.embedded_path
    }

    pub fn embedded_target(&self) -> ConnectionTarget {
        ConnectionTarget::embedded(&self.embedded_path)
    }

    /// Validate a selection into a target. No connection is attempted.
    pub fn resolve(&self, selection: ConnectionSelection) -> DbResult<ConnectionTarget> {
        selection.resolve(&self.embedded_path)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the memoised handle for `target`, connecting if needed.
    pub async fn get(&self, target: &ConnectionTarget) -> DbResult<DbHandle> {
        let cell = self.cell_for(target).await;

        let result = cell
            .get_or_try_init(|| async {
                debug!(db_target = %target.describe(), "Creating new database handle");
                let handle =
                    DbHandle::open(target, &self.pool_options, self.query_timeout).await?;
                Ok::<_, DashboardError>(HandleEntry {
                    handle,
                    created_at: Instant::now(),
                })
            })
            .await;

        match result {
            Ok(entry) => Ok(entry.handle.clone()),
            Err(e) => {
                self.remove_cell(target, &cell).await;
                Err(e)
            }
        }
    }

    /// Look up (or insert) the cell for `target`, evicting it first if expired.
    async fn cell_for(&self, target: &ConnectionTarget) -> HandleCell {
        {
            let handles = self.handles.read().await;
            if let Some(cell) = handles.get(target) {
                let expired = cell.get().is_some_and(|e| e.is_expired(self.ttl));
                if !expired {
                    return Arc::clone(cell);
                }
            }
        }

        let mut handles = self.handles.write().await;
        // Re-check under the write lock
        if let Some(cell) = handles.get(target) {
            match cell.get() {
                Some(entry) if entry.is_expired(self.ttl) => {
                    info!(
                        db_target = %target.describe(),
                        age_secs = entry.created_at.elapsed().as_secs(),
                        "Database handle expired; rebuilding"
                    );
                    let old = entry.handle.clone();
                    tokio::spawn(async move { old.close().await });
                    handles.remove(target);
                }
                _ => return Arc::clone(cell),
            }
        }

        let cell = Arc::new(OnceCell::new());
        handles.insert(target.clone(), Arc::clone(&cell));
        cell
    }

    async fn remove_cell(&self, target: &ConnectionTarget, cell: &HandleCell) {
        let mut handles = self.handles.write().await;
        if handles.get(target).is_some_and(|c| Arc::ptr_eq(c, cell)) {
            handles.remove(target);
        }
    }

    /// Number of live (initialised) handles.
    pub async fn cached_count(&self) -> usize {
        let handles = self.handles.read().await;
        handles.values().filter(|cell| cell.get().is_some()).count()
    }

    /// Close every cached handle.
    pub async fn close_all(&self) {
        // Drain under lock, close outside lock
        let drained: Vec<_> = {
            let mut handles = self.handles.write().await;
            handles.drain().collect()
        };

        for (target, cell) in drained {
            if let Some(entry) = cell.get() {
                info!(db_target = %target.describe(), "Closing database handle");
                entry.handle.close().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqliteConnectOptions;
    use tempfile::TempDir;

    async fn make_db(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("cache.db");
        let pool = sqlx::SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(true),
        )
        .await
        .unwrap();
        sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
        path
    }

    fn provider(path: PathBuf, ttl: Duration) -> DatabaseSessionProvider {
        DatabaseSessionProvider::new(path, PoolOptions::default(), Duration::from_secs(5), ttl)
    }

    #[tokio::test]
    async fn test_handles_are_memoised() {
        let dir = TempDir::new().unwrap();
        let path = make_db(&dir).await;
        let provider = provider(path, Duration::from_secs(3600));
        let target = provider.embedded_target();

        let a = provider.get(&target).await.unwrap();
        let b = provider.get(&target).await.unwrap();
        assert_eq!(provider.cached_count().await, 1);
        assert_eq!(a.server_version(), b.server_version());
        provider.close_all().await;
        assert_eq!(provider.cached_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_first_lookups_share_one_handle() {
        let dir = TempDir::new().unwrap();
        let path = make_db(&dir).await;
        let provider = Arc::new(provider(path, Duration::from_secs(3600)));
        let target = provider.embedded_target();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                let target = target.clone();
                tokio::spawn(async move { provider.get(&target).await.map(|_| ()) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(provider.handles.read().await.len(), 1);
        provider.close_all().await;
    }

    #[tokio::test]
    async fn test_expired_handle_is_rebuilt() {
        let dir = TempDir::new().unwrap();
        let path = make_db(&dir).await;
        let provider = provider(path, Duration::from_millis(20));
        let target = provider.embedded_target();

        provider.get(&target).await.unwrap();
        let first = Arc::clone(provider.handles.read().await.get(&target).unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        let handle = provider.get(&target).await.unwrap();
        let second = Arc::clone(provider.handles.read().await.get(&target).unwrap());

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(provider.cached_count().await, 1);
        assert!(handle.list_tables(false).await.is_ok());
        provider.close_all().await;
    }

    #[tokio::test]
    async fn test_failed_connect_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let provider = provider(dir.path().join("missing.db"), Duration::from_secs(60));
        let target = provider.embedded_target();

        assert!(provider.get(&target).await.is_err());
        assert!(provider.handles.read().await.is_empty());
    }

    #[test]
    fn test_resolve_names_missing_fields() {
        let provider = provider(PathBuf::from("/tmp/x.db"), Duration::from_secs(60));
        let err = provider
            .resolve(ConnectionSelection::remote("localhost", "", "pw", ""))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("user") && msg.contains("database"));
    }
}
