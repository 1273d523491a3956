//! Chart tool: render a CSV table as a chart image.
//!
//! Rendering is delegated to a [`ChartRenderer`]. The encoded image goes
//! into the artifact store; the model only ever sees its id.

use crate::llm::{ModelHandle, required_str};
use async_trait::async_trait;
use genbi_core::artifact::ArtifactStore;
use genbi_core::error::ToolError;
use genbi_core::step::sources;
use genbi_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

const CHART_GOAL_PROMPT: &str = "You need to give clear instructions to generate a chart for the following data: {csv}
which will be loaded into a dataframe. From \"{prompt}\" extract concise and clear instructions
to generate a chart in less than 8 words.";

/// Reply when the renderer produced no chart.
pub const VIZ_ERROR: &str = "VIZ_ERROR";

/// A rendered chart: the plotting code and the encoded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedChart {
    pub code: String,
    /// Base64-encoded raster image
    pub image: String,
}

#[async_trait]
pub trait ChartRenderer: Send + Sync {
    /// Render `csv` following the instruction `goal`. `Ok(None)` means the
    /// renderer ran but could not come up with a chart.
    async fn render(&self, goal: &str, csv: &str) -> Result<Option<RenderedChart>, ToolError>;
}

/// Runs an external program per chart.
///
/// The program receives `{"prompt": .., "csv": ..}` as JSON on stdin and
/// must print `{"code": .., "image": ..}` as JSON on stdout. Empty output
/// means no chart.
pub struct CommandChartRenderer {
    program: String,
    args: Vec<String>,
}

impl CommandChartRenderer {
    /// Build from an argv list. `None` when the list is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn failure(&self, reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: sources::CHART.into(),
            reason: format!("{}: {}", self.program, reason.into()),
        }
    }
}

#[async_trait]
impl ChartRenderer for CommandChartRenderer {
    async fn render(&self, goal: &str, csv: &str) -> Result<Option<RenderedChart>, ToolError> {
        let input = serde_json::json!({ "prompt": goal, "csv": csv }).to_string();

        debug!(program = %self.program, "Spawning chart renderer");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.failure(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| self.failure(e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.failure(e.to_string()))?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(program = %self.program, exit_code = code, "Chart renderer failed");
            return Err(self.failure(format!("exit code {code}: {}", stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(stdout.trim())
            .map(Some)
            .map_err(|e| self.failure(format!("bad renderer output: {e}")))
    }
}

pub struct VisualizeTableTool {
    model: ModelHandle,
    renderer: Arc<dyn ChartRenderer>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl VisualizeTableTool {
    pub fn new(
        model: ModelHandle,
        renderer: Arc<dyn ChartRenderer>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            model,
            renderer,
            artifacts,
        }
    }
}

#[async_trait]
impl Tool for VisualizeTableTool {
    fn name(&self) -> &str {
        sources::CHART
    }

    fn description(&self) -> &str {
        "Visualize a CSV table by drawing a chart. Input is the CSV produced by convert_to_table."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": { "type": "string", "description": "The user's original question" },
                "csv": { "type": "string", "description": "The output of convert_to_table" }
            },
            "required": ["prompt", "csv"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let prompt = required_str(&arguments, "prompt")?;
        let csv = required_str(&arguments, "csv")?;

        let goal_prompt = CHART_GOAL_PROMPT
            .replace("{csv}", csv)
            .replace("{prompt}", prompt);
        let goal = self.model.ask(self.name(), goal_prompt).await?;
        let goal = if goal.is_empty() { prompt } else { goal.as_str() };

        let Some(chart) = self.renderer.render(goal, csv).await? else {
            warn!(goal = %goal, "Renderer produced no chart");
            return Ok(ToolResult::failed(VIZ_ERROR));
        };

        let image_id = self
            .artifacts
            .store(chart.image)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;
        info!(artifact_id = %image_id, "Stored chart image");

        Ok(ToolResult::ok(
            serde_json::json!({ "code": chart.code, "image": image_id }).to_string(),
        ))
    }
}
