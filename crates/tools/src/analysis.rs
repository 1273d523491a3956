//! Model-backed data tools: answer a question from query rows, or turn
//! those rows into CSV for charting and tabular display.

use crate::llm::{ModelHandle, required_str, strip_code_fence};
use async_trait::async_trait;
use genbi_core::error::ToolError;
use genbi_core::step::sources;
use genbi_core::tool::{Tool, ToolResult};

const ANALYSIS_PROMPT: &str = "Analyze the following data: {rows}
Your job is to answer the following question: {prompt}
Be concise and technical in your response and restrict it to less than 50 words.
Do not ask any other questions or attempt to generate any code and visualizations.";

const CONVERSION_PROMPT: &str = "You have to convert the following data: {rows}
which is a list of tuples, into a CSV string. The first row of the CSV string must be a
comma separated list of column names, which can be derived from: {prompt}
Make intelligent guesses about the datatypes and convert empty values to appropriate
numeric and string values. If it is not possible to convert, return ERROR. Return only the
CSV string and nothing else. Example output is
First_Name,Last_Name,Age
John,Doe,30
Per,Games,21";

/// Reply when the model produced nothing convertible.
pub const CONVERT_ERROR: &str = "CONVERT_ERROR";

fn data_tool_schema(rows_hint: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "prompt": { "type": "string", "description": "The user's original question" },
            "sql_query_result": { "type": "string", "description": rows_hint }
        },
        "required": ["prompt", "sql_query_result"]
    })
}

fn fill(template: &str, arguments: &serde_json::Value) -> Result<String, ToolError> {
    let prompt = required_str(arguments, "prompt")?;
    let rows = required_str(arguments, "sql_query_result")?;
    Ok(template.replace("{rows}", rows).replace("{prompt}", prompt))
}

pub struct AnalyzeDataTool {
    model: ModelHandle,
}

impl AnalyzeDataTool {
    pub fn new(model: ModelHandle) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Tool for AnalyzeDataTool {
    fn name(&self) -> &str {
        "analyze_data"
    }

    fn description(&self) -> &str {
        "Analyze data to extract insights as per the prompt"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        data_tool_schema("The output of sql_db_query")
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let prompt = fill(ANALYSIS_PROMPT, &arguments)?;
        let analysis = self.model.ask(self.name(), prompt).await?;
        if analysis.is_empty() {
            return Ok(ToolResult::failed("No analysis could be generated"));
        }
        Ok(ToolResult::ok(analysis))
    }
}

/// Converts raw query rows into CSV with a header row.
pub struct ConvertToTableTool {
    model: ModelHandle,
}

impl ConvertToTableTool {
    pub fn new(model: ModelHandle) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Tool for ConvertToTableTool {
    fn name(&self) -> &str {
        sources::TABLE_CONVERSION
    }

    fn description(&self) -> &str {
        "Convert the rows returned by sql_db_query into a CSV table with a header row. \
         Use this before visualize_table, or to show results as a table."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        data_tool_schema("The output of sql_db_query")
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let prompt = fill(CONVERSION_PROMPT, &arguments)?;
        let reply = self.model.ask(self.name(), prompt).await?;
        let csv = strip_code_fence(&reply);
        if csv.is_empty() {
            return Ok(ToolResult::failed(CONVERT_ERROR));
        }
        Ok(ToolResult::ok(csv))
    }
}
