//! SQL statement validation for read-only enforcement.
//!
//! Every statement that reaches a memoised handle goes through
//! [`validate_readonly`]. Only queries, `SHOW …` and `EXPLAIN` of a query are
//! accepted; everything else is rejected with a permission error, including
//! statements the parser knows but this module does not list.
//!
//! Uses [sqlparser](https://docs.rs/sqlparser/) so that formatting tricks or
//! stacked statements cannot smuggle a write past the check.

use crate::error::{DashboardError, DbResult};
use crate::models::DatabaseType;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, MySqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

const READ_ONLY_REASON: &str =
    "Only read-only statements (SELECT, SHOW, EXPLAIN) may run against this connection.";

/// Get the appropriate SQL dialect for the given database type.
fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Validate SQL for read-only execution.
///
/// Returns `Err(DashboardError::InvalidInput)` when the SQL does not parse and
/// `Err(DashboardError::Permission)` when any statement is not read-only.
pub fn validate_readonly(sql: &str, db_type: DatabaseType) -> DbResult<()> {
    let dialect = get_dialect(db_type);

    let statements = Parser::parse_sql(dialect.as_ref(), sql).map_err(|e| {
        DashboardError::invalid_input(format!("Failed to parse SQL statement. Error: {}", e))
    })?;

    if statements.is_empty() {
        return Err(DashboardError::invalid_input("Empty SQL statement"));
    }

    for stmt in &statements {
        if !is_read_only(stmt) {
            return Err(DashboardError::permission(
                leading_keyword(stmt),
                READ_ONLY_REASON,
            ));
        }
    }

    Ok(())
}

fn is_read_only(stmt: &Statement) -> bool {
    match stmt {
        Statement::Query { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. }
        | Statement::ExplainTable { .. } => true,
        // EXPLAIN ANALYZE executes its statement, so the inner one must be read-only too
        Statement::Explain { statement, .. } => is_read_only(statement),
        _ => false,
    }
}

/// First keyword of the statement, used to name the rejected operation.
fn leading_keyword(stmt: &Statement) -> String {
    stmt.to_string()
        .split_whitespace()
        .next()
        .unwrap_or("UNKNOWN")
        .to_uppercase()
}
