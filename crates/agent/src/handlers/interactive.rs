//! Terminal renderer for a single session.
//!
//! Renders each classified event to a writer and, when recording, appends
//! the compact [`SessionMessage`] to the session store after a successful
//! render. Charts are recorded by artifact id only.

use super::table;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use genbi_core::artifact::ArtifactStore;
use genbi_core::error::HandlerError;
use genbi_core::handler::{DispatchHandler, HandlerOp};
use genbi_core::session::{MessageKind, SessionMessage};
use genbi_memory::SessionStore;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct InteractiveRenderer<W> {
    session_id: String,
    artifacts: Arc<dyn ArtifactStore>,
    /// Where rendered messages are recorded. `None` for replay.
    sessions: Option<SessionStore>,
    output: Mutex<W>,
    chart_dir: Option<PathBuf>,
}

impl<W: Write + Send> InteractiveRenderer<W> {
    pub fn new(
        session_id: impl Into<String>,
        artifacts: Arc<dyn ArtifactStore>,
        output: W,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            artifacts,
            sessions: None,
            output: Mutex::new(output),
            chart_dir: None,
        }
    }

    /// Record every rendered message into `sessions`.
    pub fn recording(mut self, sessions: SessionStore) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Decode chart images into PNG files under `dir`.
    pub fn with_chart_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.chart_dir = Some(dir.into());
        self
    }

    /// Record the user's query ahead of the turn. The terminal already
    /// shows what was typed, so nothing is rendered.
    pub async fn record_query(&self, text: &str) {
        if let Some(sessions) = &self.sessions {
            sessions
                .append(&self.session_id, SessionMessage::user(text))
                .await;
        }
    }

    pub fn into_inner(self) -> W {
        match self.output.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self, op: &'static str, text: &str) -> Result<(), HandlerError> {
        let mut out = self
            .output
            .lock()
            .map_err(|_| HandlerError::new(op, "output lock poisoned"))?;
        writeln!(out, "{text}")
            .and_then(|_| out.flush())
            .map_err(|e| HandlerError::new(op, e.to_string()))
    }

    async fn record(&self, kind: MessageKind, content: &str) {
        if let Some(sessions) = &self.sessions {
            sessions
                .append(&self.session_id, SessionMessage::assistant(kind, content))
                .await;
        }
    }

    async fn save_chart(
        &self,
        dir: &Path,
        image_id: &str,
        payload: &str,
    ) -> Result<PathBuf, HandlerError> {
        let op = HandlerOp::Chart.name();
        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| HandlerError::new(op, format!("chart image is not base64: {e}")))?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| HandlerError::new(op, e.to_string()))?;
        let path = dir.join(format!("{image_id}.png"));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| HandlerError::new(op, e.to_string()))?;
        Ok(path)
    }
}

#[async_trait]
impl<W: Write + Send> DispatchHandler for InteractiveRenderer<W> {
    async fn process_sql(&self, sql: &str) -> Result<(), HandlerError> {
        self.write(HandlerOp::Sql.name(), &format!("SQL:\n{sql}\n"))?;
        self.record(MessageKind::Sql, sql).await;
        Ok(())
    }

    async fn process_chart(&self, image_id: &str) -> Result<(), HandlerError> {
        let op = HandlerOp::Chart;
        let payload = self
            .artifacts
            .load(image_id)
            .await
            .map_err(|e| HandlerError::new(op.name(), e.to_string()))?
            .ok_or_else(|| {
                HandlerError::new(op.name(), format!("chart {image_id} is no longer stored"))
            })?;

        let line = match &self.chart_dir {
            Some(dir) => {
                let path = self.save_chart(dir, image_id, &payload).await?;
                format!("Chart saved to {}\n", path.display())
            }
            None => format!("Chart {image_id} ({} bytes encoded)\n", payload.len()),
        };
        debug!(session_id = %self.session_id, artifact_id = %image_id, "Rendered chart");
        self.write(op.name(), &line)?;
        self.record(MessageKind::Image, image_id).await;
        Ok(())
    }

    async fn process_chart_code(&self, code: &str) -> Result<(), HandlerError> {
        self.write(HandlerOp::ChartCode.name(), &format!("Chart code:\n{code}\n"))?;
        self.record(MessageKind::ChartCode, code).await;
        Ok(())
    }

    async fn process_data(&self, csv: &str) -> Result<(), HandlerError> {
        // Unparseable CSV is still shown, as-is
        let rendered = table::render(csv).unwrap_or_else(|| csv.to_string());
        self.write(HandlerOp::Data.name(), &format!("{rendered}\n"))?;
        self.record(MessageKind::Table, csv).await;
        Ok(())
    }

    async fn process_last_message(&self, text: &str) -> Result<(), HandlerError> {
        self.write(HandlerOp::LastMessage.name(), text)?;
        self.record(MessageKind::Text, text).await;
        Ok(())
    }

    async fn process_user_message(&self, text: &str) -> Result<(), HandlerError> {
        self.write("process_user_message", &format!("> {text}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genbi_core::session::MessageRole;
    use genbi_memory::InMemoryArtifactStore;

    fn output(renderer: InteractiveRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[tokio::test]
    async fn records_in_render_order() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let sessions = SessionStore::new();
        let id = store.store("aGVsbG8=".into()).await.unwrap();

        let renderer =
            InteractiveRenderer::new("s1", store.clone(), Vec::new()).recording(sessions.clone());
        renderer.record_query("Chart albums").await;
        renderer.process_sql("SELECT 1").await.unwrap();
        renderer.process_chart(&id).await.unwrap();
        renderer.process_chart_code("plt.bar()").await.unwrap();
        renderer.process_last_message("Done").await.unwrap();

        let history = sessions.history("s1").await;
        let kinds: Vec<MessageKind> = history.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::Text,
                MessageKind::Sql,
                MessageKind::Image,
                MessageKind::ChartCode,
                MessageKind::Text,
            ]
        );
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[2].content, id);

        let text = output(renderer);
        assert!(text.contains("SELECT 1"));
        assert!(text.contains("bytes encoded"));
        assert!(!text.contains("aGVsbG8="));
    }

    #[tokio::test]
    async fn missing_chart_is_handler_error_and_not_recorded() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let sessions = SessionStore::new();
        let renderer =
            InteractiveRenderer::new("s1", store, Vec::new()).recording(sessions.clone());

        let err = renderer.process_chart("gone").await.unwrap_err();
        assert_eq!(err.operation, "process_chart");
        assert!(renderer.process_chart("").await.is_err());
        assert!(sessions.history("s1").await.is_empty());
    }

    #[tokio::test]
    async fn charts_saved_to_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("charts");
        let store = Arc::new(InMemoryArtifactStore::new());
        let id = store.store("aGVsbG8=".into()).await.unwrap();

        let renderer = InteractiveRenderer::new("s1", store, Vec::new()).with_chart_dir(&dir);
        renderer.process_chart(&id).await.unwrap();

        let saved = std::fs::read(dir.join(format!("{id}.png"))).unwrap();
        assert_eq!(saved, b"hello");
        assert!(output(renderer).contains("Chart saved to"));
    }

    #[tokio::test]
    async fn table_rendered_but_csv_recorded() {
        let sessions = SessionStore::new();
        let renderer =
            InteractiveRenderer::new("s1", Arc::new(InMemoryArtifactStore::new()), Vec::new())
                .recording(sessions.clone());
        renderer.process_data("Artist,Albums\nAC/DC,2").await.unwrap();

        assert_eq!(
            sessions.history("s1").await[0].content,
            "Artist,Albums\nAC/DC,2"
        );
        assert!(output(renderer).contains("AC/DC  | 2"));
    }

    #[tokio::test]
    async fn replay_renderer_does_not_record() {
        let sessions = SessionStore::new();
        let artifacts: Arc<dyn ArtifactStore> = Arc::new(InMemoryArtifactStore::new());
        let live = InteractiveRenderer::new("s1", artifacts.clone(), Vec::new())
            .recording(sessions.clone());
        live.record_query("hi").await;
        live.process_last_message("answer").await.unwrap();
        let history = sessions.history("s1").await;
        assert_eq!(history.len(), 2);

        let viewer = InteractiveRenderer::new("s1", artifacts, Vec::new());
        let summary = crate::replay::replay(&history, &viewer).await;
        assert_eq!(summary.replayed, 2);
        viewer.record_query("again").await;

        assert_eq!(sessions.history("s1").await, history);
        assert_eq!(output(viewer), "> hi\nanswer\n");
    }
}
