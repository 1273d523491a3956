//! A handler that only logs what it receives.

use async_trait::async_trait;
use genbi_core::error::HandlerError;
use genbi_core::handler::DispatchHandler;
use tracing::info;

pub struct LogHandler {
    session_id: String,
}

impl LogHandler {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl DispatchHandler for LogHandler {
    async fn process_sql(&self, sql: &str) -> Result<(), HandlerError> {
        info!(session_id = %self.session_id, sql = %sql, "SQL query");
        Ok(())
    }

    async fn process_chart(&self, image_id: &str) -> Result<(), HandlerError> {
        info!(session_id = %self.session_id, artifact_id = %image_id, "Chart image");
        Ok(())
    }

    async fn process_chart_code(&self, code: &str) -> Result<(), HandlerError> {
        info!(session_id = %self.session_id, code = %code, "Chart code");
        Ok(())
    }

    async fn process_data(&self, csv: &str) -> Result<(), HandlerError> {
        info!(
            session_id = %self.session_id,
            rows = csv.lines().count().saturating_sub(1),
            "Table data"
        );
        Ok(())
    }

    async fn process_last_message(&self, text: &str) -> Result<(), HandlerError> {
        info!(session_id = %self.session_id, answer = %text, "Final answer");
        Ok(())
    }

    async fn process_user_message(&self, text: &str) -> Result<(), HandlerError> {
        info!(session_id = %self.session_id, query = %text, "User message");
        Ok(())
    }
}
