//! Shared fixtures for integration tests.

#![allow(dead_code)]

use db_chat_dashboard::config::PoolOptions;
use db_chat_dashboard::db::{DatabaseSessionProvider, DbHandle, seed_file};
use db_chat_dashboard::models::QueryOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A seeded embedded database in a temp directory. Keep the `TempDir` alive
/// for as long as the provider is used.
pub async fn seeded_provider() -> (TempDir, Arc<DatabaseSessionProvider>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("student.db");
    seed_file(&path).await.unwrap();
    (dir, provider_for(path))
}

pub fn provider_for(path: PathBuf) -> Arc<DatabaseSessionProvider> {
    Arc::new(DatabaseSessionProvider::new(
        path,
        PoolOptions::default(),
        Duration::from_secs(30),
        Duration::from_secs(3600),
    ))
}

pub async fn embedded_handle(provider: &DatabaseSessionProvider) -> DbHandle {
    provider.get(&provider.embedded_target()).await.unwrap()
}

pub async fn table_names(handle: &DbHandle) -> Vec<String> {
    let mut names: Vec<String> = handle
        .list_tables(true)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    names.sort();
    names
}

pub async fn count_rows(handle: &DbHandle, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) AS n FROM \"{}\"", table);
    let result = handle
        .run_read_query(&sql, &QueryOptions::default())
        .await
        .unwrap();
    result.rows[0][0].as_i64().unwrap()
}
