//! DispatchHandler trait: the sink that renders classified events.
//!
//! Every operation has a no-op default, so a handler implements only the
//! subset it cares about. Operations report failure through
//! [`HandlerError`]; the dispatcher is responsible for containing it.

use crate::error::HandlerError;
use async_trait::async_trait;

/// The five rendering operations a handler exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerOp {
    Sql,
    Chart,
    ChartCode,
    Data,
    LastMessage,
}

impl HandlerOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sql => "process_sql",
            Self::Chart => "process_chart",
            Self::ChartCode => "process_chart_code",
            Self::Data => "process_data",
            Self::LastMessage => "process_last_message",
        }
    }

    /// Call the matching operation on `handler`.
    pub async fn invoke(
        &self,
        handler: &dyn DispatchHandler,
        content: &str,
    ) -> Result<(), HandlerError> {
        match self {
            Self::Sql => handler.process_sql(content).await,
            Self::Chart => handler.process_chart(content).await,
            Self::ChartCode => handler.process_chart_code(content).await,
            Self::Data => handler.process_data(content).await,
            Self::LastMessage => handler.process_last_message(content).await,
        }
    }
}

impl std::fmt::Display for HandlerOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[async_trait]
pub trait DispatchHandler: Send + Sync {
    /// A SQL query the agent decided to run.
    async fn process_sql(&self, _sql: &str) -> Result<(), HandlerError> {
        Ok(())
    }

    /// A chart, given by artifact id.
    async fn process_chart(&self, _image_id: &str) -> Result<(), HandlerError> {
        Ok(())
    }

    /// The code that produced the chart.
    async fn process_chart_code(&self, _code: &str) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Tabular data as CSV with a header row.
    async fn process_data(&self, _csv: &str) -> Result<(), HandlerError> {
        Ok(())
    }

    /// The turn's final answer.
    async fn process_last_message(&self, _text: &str) -> Result<(), HandlerError> {
        Ok(())
    }

    /// A user message seen during history replay.
    async fn process_user_message(&self, _text: &str) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// A handler that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl DispatchHandler for NoopHandler {}
