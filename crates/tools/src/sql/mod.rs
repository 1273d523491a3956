//! SQL toolkit: list tables, describe them, check a query, run it.
//!
//! Database errors are returned to the model as failed observations so it
//! can correct its query; only provider failures end the turn.

pub mod database;

use crate::llm::{ModelHandle, required_str, strip_code_fence};
use async_trait::async_trait;
use database::SqlDatabase;
use genbi_core::error::ToolError;
use genbi_core::step::sources;
use genbi_core::tool::{Tool, ToolResult};
use std::sync::Arc;
use tracing::warn;

pub use database::{DatabaseError, Dialect};

const QUERY_CHECKER_PROMPT: &str = "{query}
Double check the {dialect} query above for common mistakes, including:
- Using NOT IN with NULL values
- Using UNION when UNION ALL should have been used
- Using BETWEEN for exclusive ranges
- Data type mismatch in predicates
- Properly quoting identifiers
- Using the correct number of arguments for functions
- Casting to the correct data type
- Using the proper columns for joins

If there are any of the above mistakes, rewrite the query. If there are no mistakes, just reproduce the original query.

Output the final SQL query only.

SQL Query: ";

fn db_failure(tool: &str, e: DatabaseError) -> ToolResult {
    warn!(tool, error = %e, "Database call failed");
    ToolResult::failed(format!("Error: {e}"))
}

pub struct ListTablesTool {
    db: Arc<SqlDatabase>,
}

impl ListTablesTool {
    pub fn new(db: Arc<SqlDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for ListTablesTool {
    fn name(&self) -> &str {
        "sql_db_list_tables"
    }

    fn description(&self) -> &str {
        "Input is an empty string, output is a comma-separated list of tables in the database."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "tool_input": { "type": "string", "description": "An empty string" }
            }
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        match self.db.table_names().await {
            Ok(names) => Ok(ToolResult::ok(names.join(", "))),
            Err(e) => Ok(db_failure(self.name(), e)),
        }
    }
}

pub struct SchemaTool {
    db: Arc<SqlDatabase>,
}

impl SchemaTool {
    pub fn new(db: Arc<SqlDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for SchemaTool {
    fn name(&self) -> &str {
        "sql_db_schema"
    }

    fn description(&self) -> &str {
        "Input to this tool is a comma-separated list of tables, output is the schema and sample rows for those tables. \
         Be sure that the tables actually exist by calling sql_db_list_tables first!"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "table_names": {
                    "type": "string",
                    "description": "A comma-separated list of the table names, e.g. 'albums, artists'"
                }
            },
            "required": ["table_names"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let tables: Vec<String> = required_str(&arguments, "table_names")?
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tables.is_empty() {
            return Err(ToolError::InvalidArguments("No table names given".into()));
        }
        match self.db.table_info(&tables).await {
            Ok(info) => Ok(ToolResult::ok(info)),
            Err(e) => Ok(db_failure(self.name(), e)),
        }
    }
}

pub struct QueryTool {
    db: Arc<SqlDatabase>,
}

impl QueryTool {
    pub fn new(db: Arc<SqlDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        "sql_db_query"
    }

    fn description(&self) -> &str {
        "Input to this tool is a detailed and correct SQL query, output is a result from the database. \
         If the query is not correct, an error message will be returned; rewrite the query, check it, and try again."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "A detailed and correct SQL query." }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = required_str(&arguments, "query")?;
        match self.db.run(query).await {
            Ok(rows) => Ok(ToolResult::ok(rows)),
            Err(e) => Ok(db_failure(self.name(), e)),
        }
    }
}

/// Asks the model to review a query before it runs. Its output is the
/// query the agent is about to execute.
pub struct QueryCheckerTool {
    model: ModelHandle,
    dialect: String,
}

impl QueryCheckerTool {
    pub fn new(model: ModelHandle, dialect: impl Into<String>) -> Self {
        Self {
            model,
            dialect: dialect.into(),
        }
    }
}

#[async_trait]
impl Tool for QueryCheckerTool {
    fn name(&self) -> &str {
        sources::SQL_QUERY_CHECKER
    }

    fn description(&self) -> &str {
        "Use this tool to double check if your query is correct before executing it. \
         Always use this tool before executing a query with sql_db_query!"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "A detailed and SQL query to be checked." }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = required_str(&arguments, "query")?;
        let prompt = QUERY_CHECKER_PROMPT
            .replace("{dialect}", &self.dialect)
            .replace("{query}", query);
        let checked = self.model.ask(self.name(), prompt).await?;
        Ok(ToolResult::ok(strip_code_fence(&checked)))
    }
}
