//! Demo schema seeder.
//!
//! Destructively (re)creates the school fixture: five tables in dependency
//! order, then a fixed set of rows. Running it twice yields the same state
//! because dropping an `AUTOINCREMENT` table also resets its sequence.

use crate::error::DbResult;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

/// Children first; foreign keys are enforced on sqlx connections.
const DROP_ORDER: [&str; 5] = ["MARKS", "STUDENT", "SUBJECT", "CLASS", "TEACHER"];

const CREATE_TABLES: &str = r#"
CREATE TABLE CLASS (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    section TEXT NOT NULL
);

CREATE TABLE STUDENT (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    dob TEXT,
    gender TEXT,
    class_id INTEGER,
    FOREIGN KEY(class_id) REFERENCES CLASS(id)
);

CREATE TABLE TEACHER (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    subject_specialization TEXT
);

CREATE TABLE SUBJECT (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    teacher_id INTEGER,
    FOREIGN KEY(teacher_id) REFERENCES TEACHER(id)
);

CREATE TABLE MARKS (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER,
    subject_id INTEGER,
    marks INTEGER,
    FOREIGN KEY(student_id) REFERENCES STUDENT(id),
    FOREIGN KEY(subject_id) REFERENCES SUBJECT(id)
);
"#;

const CLASSES: [(&str, &str); 3] = [
    ("Data Science", "A"),
    ("Data Science", "B"),
    ("DevOps", "A"),
];

const TEACHERS: [(&str, &str); 3] = [
    ("Dr. Smith", "ML"),
    ("Prof. Jane", "Cloud"),
    ("Mr. Alan", "Python"),
];

const SUBJECTS: [(&str, i64); 3] = [
    ("Machine Learning", 1),
    ("Cloud Computing", 2),
    ("Python Programming", 3),
];

const STUDENTS: [(&str, &str, &str, i64); 5] = [
    ("Krish", "2002-01-10", "M", 1),
    ("John", "2001-11-23", "M", 2),
    ("Anita", "2003-05-16", "F", 1),
    ("Jacob", "2000-09-02", "M", 3),
    ("Priya", "2002-12-05", "F", 1),
];

const MARKS: [(i64, i64, i64); 6] = [
    (1, 1, 85),
    (1, 2, 78),
    (2, 1, 92),
    (3, 3, 88),
    (4, 2, 45),
    (5, 1, 75),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRecord {
    pub id: i64,
    pub name: String,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub class_id: Option<i64>,
}

/// What the seeder left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub tables: Vec<TableCount>,
    pub students: Vec<StudentRecord>,
}

impl SeedReport {
    pub fn rows_in(&self, table: &str) -> Option<i64> {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .map(|t| t.rows)
    }
}

impl std::fmt::Display for SeedReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Sample STUDENT records:")?;
        for s in &self.students {
            writeln!(
                f,
                "({}, '{}', '{}', '{}', {})",
                s.id,
                s.name,
                s.dob.as_deref().unwrap_or("NULL"),
                s.gender.as_deref().unwrap_or("NULL"),
                s.class_id.map_or("NULL".to_string(), |c| c.to_string())
            )?;
        }
        for t in &self.tables {
            writeln!(f, "{}: {} rows", t.table, t.rows)?;
        }
        Ok(())
    }
}

/// Seed the database file at `path`, creating it if needed.
pub async fn seed_file(path: &Path) -> DbResult<SeedReport> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    let report = seed(&pool).await;
    pool.close().await;
    report
}

/// Drop, recreate and populate the fixture tables in one transaction.
pub async fn seed(pool: &SqlitePool) -> DbResult<SeedReport> {
    let mut tx = pool.begin().await?;

    for table in DROP_ORDER {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&mut *tx)
            .await?;
    }
    sqlx::raw_sql(CREATE_TABLES).execute(&mut *tx).await?;

    for (name, section) in CLASSES {
        sqlx::query("INSERT INTO CLASS (name, section) VALUES (?, ?)")
            .bind(name)
            .bind(section)
            .execute(&mut *tx)
            .await?;
    }
    for (name, specialization) in TEACHERS {
        sqlx::query("INSERT INTO TEACHER (name, subject_specialization) VALUES (?, ?)")
            .bind(name)
            .bind(specialization)
            .execute(&mut *tx)
            .await?;
    }
    for (name, teacher_id) in SUBJECTS {
        sqlx::query("INSERT INTO SUBJECT (name, teacher_id) VALUES (?, ?)")
            .bind(name)
            .bind(teacher_id)
            .execute(&mut *tx)
            .await?;
    }
    for (name, dob, gender, class_id) in STUDENTS {
        sqlx::query("INSERT INTO STUDENT (name, dob, gender, class_id) VALUES (?, ?, ?, ?)")
            .bind(name)
            .bind(dob)
            .bind(gender)
            .bind(class_id)
            .execute(&mut *tx)
            .await?;
    }
    for (student_id, subject_id, marks) in MARKS {
        sqlx::query("INSERT INTO MARKS (student_id, subject_id, marks) VALUES (?, ?, ?)")
            .bind(student_id)
            .bind(subject_id)
            .bind(marks)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let report = report(pool).await?;
    info!(
        students = report.students.len(),
        tables = report.tables.len(),
        "Seeded demo schema"
    );
    Ok(report)
}

async fn report(pool: &SqlitePool) -> DbResult<SeedReport> {
    let mut tables = Vec::with_capacity(DROP_ORDER.len());
    for table in ["CLASS", "TEACHER", "SUBJECT", "STUDENT", "MARKS"] {
        let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await?;
        tables.push(TableCount {
            table: table.to_string(),
            rows,
        });
    }

    let students = sqlx::query_as::<_, (i64, String, Option<String>, Option<String>, Option<i64>)>(
        "SELECT id, name, dob, gender, class_id FROM STUDENT ORDER BY id",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(id, name, dob, gender, class_id)| StudentRecord {
        id,
        name,
        dob,
        gender,
        class_id,
    })
    .collect();

    Ok(SeedReport { tables, students })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_seed_creates_fixture() {
        let dir = TempDir::new().unwrap();
        let report = seed_file(&dir.path().join("student.db")).await.unwrap();

        assert_eq!(report.rows_in("CLASS"), Some(3));
        assert_eq!(report.rows_in("TEACHER"), Some(3));
        assert_eq!(report.rows_in("SUBJECT"), Some(3));
        assert_eq!(report.rows_in("STUDENT"), Some(5));
        assert_eq!(report.rows_in("MARKS"), Some(6));
        assert_eq!(report.students[0].name, "Krish");
        assert_eq!(report.students[4].id, 5);
    }

    #[tokio::test]
    async fn test_display_lists_students() {
        let dir = TempDir::new().unwrap();
        let report = seed_file(&dir.path().join("student.db")).await.unwrap();
        let text = report.to_string();
        assert!(text.starts_with("Sample STUDENT records:"));
        assert!(text.contains("(3, 'Anita', '2003-05-16', 'F', 1)"));
    }
}
