//! Database tools the SQL agent can call.
//!
//! Every tool result is plain text fed back to the model. Failures are
//! returned as `Error: ...` observations so the model can correct itself;
//! they never abort the turn.

use crate::db::{DbHandle, quote_identifier};
use crate::error::DbResult;
use crate::models::QueryOptions;
use crate::oracle::client::ToolSpec;
use crate::oracle::format::{format_as_table, format_as_tsv};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;

pub const LIST_TABLES: &str = "list_tables";
pub const DESCRIBE_TABLES: &str = "describe_tables";
pub const RUN_QUERY: &str = "run_query";

/// Rows shown after each table definition.
pub const SAMPLE_ROWS: u32 = 3;

/// Input for `list_tables`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTablesInput {}

/// Input for `describe_tables`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTablesInput {
    /// Table names to describe. Call list_tables first to be sure they exist.
    pub tables: Vec<String>,
}

/// Input for `run_query`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunQueryInput {
    /// A single read-only SQL query. Write statements are rejected.
    pub sql: String,
}

fn parameters<T: JsonSchema>() -> JsonValue {
    let mut value = schema_for!(T).to_value();
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// Tool definitions advertised to the model.
pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::function(
            LIST_TABLES,
            "List the tables in the database. Takes no arguments.",
            parameters::<ListTablesInput>(),
        ),
        ToolSpec::function(
            DESCRIBE_TABLES,
            "Show the schema and sample rows of the given tables.",
            parameters::<DescribeTablesInput>(),
        ),
        ToolSpec::function(
            RUN_QUERY,
            "Run a read-only SQL query and return the rows. On error, rewrite the query and try again.",
            parameters::<RunQueryInput>(),
        ),
    ]
}

/// Dispatches tool calls against one database handle.
pub struct SqlToolbox<'a> {
    db: &'a DbHandle,
    query_options: QueryOptions,
}

impl<'a> SqlToolbox<'a> {
    pub fn new(db: &'a DbHandle) -> Self {
        Self {
            db,
            query_options: QueryOptions::default(),
        }
    }

    pub fn with_query_options(mut self, options: QueryOptions) -> Self {
        self.query_options = options;
        self
    }

    /// Run `name` with JSON-encoded `arguments`, returning the observation text.
    pub async fn invoke(&self, name: &str, arguments: &str) -> String {
        debug!(tool = %name, "Invoking agent tool");
        let result = match name {
            LIST_TABLES => self.list_tables().await,
            DESCRIBE_TABLES => match parse_args::<DescribeTablesInput>(arguments) {
                Ok(input) => self.describe_tables(&input.tables).await,
                Err(msg) => return msg,
            },
            RUN_QUERY => match parse_args::<RunQueryInput>(arguments) {
                Ok(input) => self.run_query(&input.sql).await,
                Err(msg) => return msg,
            },
            other => {
                return format!(
                    "Error: {} is not a valid tool, try one of [{}, {}, {}].",
                    other, LIST_TABLES, DESCRIBE_TABLES, RUN_QUERY
                );
            }
        };
        result.unwrap_or_else(|e| format!("Error: {}", e))
    }

    async fn list_tables(&self) -> DbResult<String> {
        let tables = self.db.list_tables(true).await?;
        let names: Vec<String> = tables.into_iter().map(|t| t.name).collect();
        Ok(names.join(", "))
    }

    async fn describe_tables(&self, tables: &[String]) -> DbResult<String> {
        let mut sections = Vec::with_capacity(tables.len());
        for requested in tables {
            let name = self.db.resolve_table(requested.trim(), true).await?;
            let schema = self.db.describe_table(&name).await?;
            let sample_sql = format!(
                "SELECT * FROM {} LIMIT {}",
                quote_identifier(&name, self.db.db_type()),
                SAMPLE_ROWS
            );
            let sample = self
                .db
                .run_read_query(&sample_sql, &QueryOptions::default().with_limit(SAMPLE_ROWS))
                .await?;

            let mut section = schema.to_ddl_summary();
            section.push_str(&format!(
                "\n\n/*\n{} rows from {} table:\n{}\n*/",
                SAMPLE_ROWS,
                name,
                format_as_tsv(&sample)
            ));
            sections.push(section);
        }
        Ok(sections.join("\n\n"))
    }

    async fn run_query(&self, sql: &str) -> DbResult<String> {
        let result = self.db.run_read_query(sql, &self.query_options).await?;
        if result.is_empty() {
            return Ok("Query returned no rows.".to_string());
        }
        Ok(format_as_table(&result))
    }
}

fn parse_args<T: DeserializeOwned>(arguments: &str) -> Result<T, String> {
    let raw = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };
    serde_json::from_str(raw).map_err(|e| format!("Error: invalid tool arguments: {}", e))
}
