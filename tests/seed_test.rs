//! Integration tests for the demo database seeder.

mod common;

use common::{count_rows, embedded_handle, provider_for, table_names};
use db_chat_dashboard::db::seed_file;
use tempfile::TempDir;

#[tokio::test]
async fn test_seed_creates_fixture_tables() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("student.db");

    let report = seed_file(&path).await.unwrap();
    assert_eq!(report.rows_in("STUDENT"), Some(5));
    assert_eq!(report.rows_in("MARKS"), Some(6));
    assert_eq!(report.students.len(), 5);
    assert!(report.to_string().starts_with("Sample STUDENT records:"));

    let provider = provider_for(path);
    let handle = embedded_handle(&provider).await;
    assert_eq!(
        table_names(&handle).await,
        vec!["CLASS", "MARKS", "STUDENT", "SUBJECT", "TEACHER"]
    );
    assert_eq!(count_rows(&handle, "STUDENT").await, 5);
    assert_eq!(count_rows(&handle, "CLASS").await, 3);
    provider.close_all().await;
}

#[tokio::test]
async fn test_seed_is_repeatable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("student.db");

    let first = seed_file(&path).await.unwrap();
    let second = seed_file(&path).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(second.rows_in("STUDENT"), Some(5));

    // Ids restart because the tables are dropped, not truncated
    assert_eq!(second.students[0].id, 1);
    assert_eq!(second.students[0].name, "Krish");
    assert_eq!(second.students[2].name, "Anita");
}

#[tokio::test]
async fn test_seed_replaces_modified_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("student.db");
    seed_file(&path).await.unwrap();

    {
        let options = sqlx::sqlite::SqliteConnectOptions::new().filename(&path);
        let pool = sqlx::SqlitePool::connect_with(options).await.unwrap();
        sqlx::query("DELETE FROM MARKS").execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO STUDENT (name) VALUES ('Extra')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }

    let report = seed_file(&path).await.unwrap();
    assert_eq!(report.rows_in("STUDENT"), Some(5));
    assert_eq!(report.rows_in("MARKS"), Some(6));
}
