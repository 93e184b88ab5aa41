//! Schema introspection module.
//!
//! # Architecture
//!
//! SQL queries are organized in the `queries` submodule with constants for each
//! database type. Database-specific implementations are in their respective
//! submodules, each providing the same interface. Table names are always bound
//! as parameters; nothing user-supplied is formatted into catalog queries.

use crate::db::pool::DbPool;
use crate::error::{DashboardError, DbResult};
use crate::models::{ColumnDefinition, DatabaseType, ForeignKey, TableInfo, TableSchema, TableType};
use tracing::debug;

/// Schema inspector for database introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// List tables in the connected database, read fresh from the catalog.
    pub async fn list_tables(pool: &DbPool, include_views: bool) -> DbResult<Vec<TableInfo>> {
        match pool {
            DbPool::MySql(p) => mysql::list_tables(p, include_views).await,
            DbPool::SQLite(p) => sqlite::list_tables(p, include_views).await,
        }
    }

    /// Describe a table's columns and keys.
    pub async fn describe_table(pool: &DbPool, table_name: &str) -> DbResult<TableSchema> {
        match pool {
            DbPool::MySql(p) => mysql::describe_table(p, table_name).await,
            DbPool::SQLite(p) => sqlite::describe_table(p, table_name).await,
        }
    }
}

/// Quote an identifier for the given dialect, doubling any embedded quote char.
pub fn quote_identifier(name: &str, db_type: DatabaseType) -> String {
    match db_type {
        DatabaseType::MySQL => format!("`{}`", name.replace('`', "``")),
        DatabaseType::SQLite => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

fn table_not_found(table_name: &str) -> DashboardError {
    DashboardError::schema(format!("Table '{}' not found", table_name), table_name)
}

mod queries {
    pub mod mysql {
        pub const LIST_TABLES_WITH_VIEWS: &str = r#"
            SELECT
                CONVERT(TABLE_NAME USING utf8) AS TABLE_NAME,
                CONVERT(TABLE_TYPE USING utf8) AS TABLE_TYPE,
                TABLE_ROWS as ROW_COUNT,
                CONVERT(TABLE_COMMENT USING utf8) AS TABLE_COMMENT
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE()
            AND TABLE_TYPE IN ('BASE TABLE', 'VIEW')
            ORDER BY TABLE_NAME
            "#;

        pub const LIST_TABLES_NO_VIEWS: &str = r#"
            SELECT
                CONVERT(TABLE_NAME USING utf8) AS TABLE_NAME,
                CONVERT(TABLE_TYPE USING utf8) AS TABLE_TYPE,
                TABLE_ROWS as ROW_COUNT,
                CONVERT(TABLE_COMMENT USING utf8) AS TABLE_COMMENT
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE()
            AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            CONVERT(COLUMN_NAME USING utf8) AS COLUMN_NAME,
            CONVERT(COLUMN_TYPE USING utf8) AS COLUMN_TYPE,
            CONVERT(IS_NULLABLE USING utf8) AS IS_NULLABLE,
            CONVERT(COLUMN_DEFAULT USING utf8) AS COLUMN_DEFAULT,
            CONVERT(COLUMN_KEY USING utf8) AS COLUMN_KEY
        FROM information_schema.columns
        WHERE TABLE_NAME = ? AND TABLE_SCHEMA = DATABASE()
        ORDER BY ORDINAL_POSITION
        "#;

        pub const DESCRIBE_FOREIGN_KEYS: &str = r#"
        SELECT
            CONVERT(COLUMN_NAME USING utf8) AS COLUMN_NAME,
            CONVERT(REFERENCED_TABLE_NAME USING utf8) AS REFERENCED_TABLE_NAME,
            CONVERT(REFERENCED_COLUMN_NAME USING utf8) AS REFERENCED_COLUMN_NAME
        FROM information_schema.KEY_COLUMN_USAGE
        WHERE TABLE_NAME = ?
        AND TABLE_SCHEMA = DATABASE()
        AND REFERENCED_TABLE_NAME IS NOT NULL
        "#;
    }

    pub mod sqlite {
        pub const LIST_TABLES_WITH_VIEWS: &str = r#"
            SELECT name, type FROM sqlite_master
            WHERE type IN ('table', 'view')
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;

        pub const LIST_TABLES_NO_VIEWS: &str = r#"
            SELECT name, type FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
            SELECT name, type, "notnull", dflt_value, pk
            FROM pragma_table_info(?)
            ORDER BY cid
            "#;

        pub const DESCRIBE_FOREIGN_KEYS: &str = r#"
            SELECT "from", "table", "to"
            FROM pragma_foreign_key_list(?)
            ORDER BY id, seq
            "#;
    }
}

mod mysql {
    use super::*;
    use sqlx::{MySqlPool, Row};

    /// Try to get a u64 value from a row, handling MySQL version differences.
    /// MySQL 5.x may return BIGINT (i64), MySQL 8.x returns BIGINT UNSIGNED (u64).
    fn try_get_u64(row: &sqlx::mysql::MySqlRow, column: &str) -> Option<u64> {
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(column) {
            return Some(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(column) {
            return Some(v as u64);
        }
        None
    }

    /// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
    fn get_optional_string(row: &sqlx::mysql::MySqlRow, column: &str) -> Option<String> {
        row.try_get::<Option<String>, _>(column)
            .ok()
            .flatten()
            .or_else(|| {
                row.try_get::<Option<Vec<u8>>, _>(column)
                    .ok()
                    .flatten()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
    }

    fn get_string(row: &sqlx::mysql::MySqlRow, column: &str) -> String {
        get_optional_string(row, column).unwrap_or_default()
    }

    pub async fn list_tables(pool: &MySqlPool, include_views: bool) -> DbResult<Vec<TableInfo>> {
        let query = if include_views {
            queries::mysql::LIST_TABLES_WITH_VIEWS
        } else {
            queries::mysql::LIST_TABLES_NO_VIEWS
        };

        let rows = sqlx::query(query).fetch_all(pool).await?;

        let tables = rows
            .iter()
            .filter_map(|row| {
                let name = get_string(row, "TABLE_NAME");
                if name.is_empty() {
                    return None;
                }

                let type_str = get_string(row, "TABLE_TYPE");
                let mut table = TableInfo::new(&name, TableType::parse(&type_str));
                if let Some(count) = try_get_u64(row, "ROW_COUNT") {
                    table = table.with_row_count(count);
                }
                if let Some(comment) = get_optional_string(row, "TABLE_COMMENT")
                    && !comment.is_empty()
                {
                    table = table.with_comment(comment);
                }
                Some(table)
            })
            .collect::<Vec<_>>();

        debug!(count = tables.len(), "Listed MySQL tables");
        Ok(tables)
    }

    pub async fn describe_table(pool: &MySqlPool, table_name: &str) -> DbResult<TableSchema> {
        let rows = sqlx::query(queries::mysql::DESCRIBE_COLUMNS)
            .bind(table_name)
            .fetch_all(pool)
            .await?;

        let columns: Vec<ColumnDefinition> = rows
            .iter()
            .map(|row| {
                let mut col = ColumnDefinition::new(
                    get_string(row, "COLUMN_NAME"),
                    get_string(row, "COLUMN_TYPE"),
                    get_string(row, "IS_NULLABLE") == "YES",
                )
                .with_primary_key(get_string(row, "COLUMN_KEY") == "PRI");
                if let Some(def) = get_optional_string(row, "COLUMN_DEFAULT") {
                    col = col.with_default(def);
                }
                col
            })
            .collect();

        if columns.is_empty() {
            return Err(table_not_found(table_name));
        }

        let foreign_keys = sqlx::query(queries::mysql::DESCRIBE_FOREIGN_KEYS)
            .bind(table_name)
            .fetch_all(pool)
            .await?
            .iter()
            .map(|row| {
                ForeignKey::new(
                    get_string(row, "COLUMN_NAME"),
                    get_string(row, "REFERENCED_TABLE_NAME"),
                    get_string(row, "REFERENCED_COLUMN_NAME"),
                )
            })
            .collect();

        Ok(build_schema(table_name, columns, foreign_keys))
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Row, SqlitePool};

    pub async fn list_tables(pool: &SqlitePool, include_views: bool) -> DbResult<Vec<TableInfo>> {
        let query = if include_views {
            queries::sqlite::LIST_TABLES_WITH_VIEWS
        } else {
            queries::sqlite::LIST_TABLES_NO_VIEWS
        };

        let rows = sqlx::query(query).fetch_all(pool).await?;

        let tables = rows
            .iter()
            .map(|row| {
                let name: String = row.get("name");
                let type_str: String = row.get("type");
                TableInfo::new(name, TableType::parse(&type_str))
            })
            .collect::<Vec<_>>();

        debug!(count = tables.len(), "Listed SQLite tables");
        Ok(tables)
    }

    pub async fn describe_table(pool: &SqlitePool, table_name: &str) -> DbResult<TableSchema> {
        let rows = sqlx::query(queries::sqlite::DESCRIBE_COLUMNS)
            .bind(table_name)
            .fetch_all(pool)
            .await?;

        let columns: Vec<ColumnDefinition> = rows
            .iter()
            .map(|row| {
                let name: String = row.get("name");
                let data_type: String = row.try_get("type").unwrap_or_default();
                let notnull: i64 = row.try_get("notnull").unwrap_or(0);
                let pk: i64 = row.try_get("pk").unwrap_or(0);
                let mut col =
                    ColumnDefinition::new(name, data_type, notnull == 0).with_primary_key(pk > 0);
                if let Ok(Some(def)) = row.try_get::<Option<String>, _>("dflt_value") {
                    col = col.with_default(def);
                }
                col
            })
            .collect();

        if columns.is_empty() {
            return Err(table_not_found(table_name));
        }

        let foreign_keys = sqlx::query(queries::sqlite::DESCRIBE_FOREIGN_KEYS)
            .bind(table_name)
            .fetch_all(pool)
            .await
            .unwrap_or_default()
            .iter()
            .map(|row| {
                let column: String = row.get("from");
                let ref_table: String = row.get("table");
                let ref_column: Option<String> = row.try_get("to").ok().flatten();
                // A missing "to" means the parent's primary key
                ForeignKey::new(column, ref_table, ref_column.unwrap_or_else(|| "id".into()))
            })
            .collect();

        Ok(build_schema(table_name, columns, foreign_keys))
    }
}

fn build_schema(
    table_name: &str,
    columns: Vec<ColumnDefinition>,
    foreign_keys: Vec<ForeignKey>,
) -> TableSchema {
    let primary_key = columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| c.name.clone())
        .collect();

    TableSchema {
        table_name: table_name.to_string(),
        columns,
        primary_key,
        foreign_keys,
    }
}
