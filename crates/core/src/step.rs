//! Step events: the intermediate results of one reasoning turn.
//!
//! The loop emits a [`StepEvent`] for every tool observation and for the
//! final answer. The classifier turns each into a [`ClassifiedEvent`].

use serde::{Deserialize, Serialize};

/// Producer names understood by the classifier.
pub mod sources {
    /// Validated SQL about to be run.
    pub const SQL_QUERY_CHECKER: &str = "sql_db_query_checker";
    /// Query rows converted to CSV with a header row.
    pub const TABLE_CONVERSION: &str = "convert_to_table";
    /// `{"code": .., "image": <artifact id>}` from the chart tool.
    pub const CHART: &str = "visualize_table";
    /// Reserved for the loop's own final answer.
    pub const ASSISTANT: &str = "assistant";
}

/// One unit of intermediate output from a single turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepEvent {
    pub source_name: String,
    pub raw_payload: String,
    pub session_id: String,
}

impl StepEvent {
    pub fn new(
        source_name: impl Into<String>,
        raw_payload: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            raw_payload: raw_payload.into(),
            session_id: session_id.into(),
        }
    }

    /// The final-answer event for `session_id`.
    pub fn final_answer(text: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::new(sources::ASSISTANT, text, session_id)
    }

    /// Decode the tool layer's wire shape `{"type":"tool","name":..,"content":..}`.
    ///
    /// Structured content is re-serialized to JSON text. Returns `None` for
    /// anything that is not a tool message.
    pub fn from_wire(session_id: &str, wire: &serde_json::Value) -> Option<Self> {
        let step: WireStep = serde_json::from_value(wire.clone()).ok()?;
        if step.r#type != "tool" {
            return None;
        }
        let payload = match step.content {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        Some(Self::new(step.name, payload, session_id))
    }
}

#[derive(Deserialize)]
struct WireStep {
    r#type: String,
    name: String,
    #[serde(default)]
    content: serde_json::Value,
}

/// The closed set of semantic kinds a step event can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SqlQuery,
    TableConversion,
    ChartResult,
    PlainText,
    Unknown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlQuery => "sql_query",
            Self::TableConversion => "table_conversion",
            Self::ChartResult => "chart_result",
            Self::PlainText => "plain_text",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A step event with its kind decided and its typed fields extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    SqlQuery { sql: String },
    TableConversion { csv: String },
    /// `image_ref` is an artifact id, never the encoded image itself.
    ChartResult { code: String, image_ref: String },
    PlainText { text: String },
    Unknown { source_name: String },
}

impl ClassifiedEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SqlQuery { .. } => EventKind::SqlQuery,
            Self::TableConversion { .. } => EventKind::TableConversion,
            Self::ChartResult { .. } => EventKind::ChartResult,
            Self::PlainText { .. } => EventKind::PlainText,
            Self::Unknown { .. } => EventKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_string_content() {
        let wire = serde_json::json!({
            "type": "tool",
            "name": "sql_db_query_checker",
            "content": "SELECT 1"
        });
        let step = StepEvent::from_wire("s1", &wire).unwrap();
        assert_eq!(step.source_name, sources::SQL_QUERY_CHECKER);
        assert_eq!(step.raw_payload, "SELECT 1");
        assert_eq!(step.session_id, "s1");
    }

    #[test]
    fn wire_structured_content_is_serialized() {
        let wire = serde_json::json!({
            "type": "tool",
            "name": "visualize_table",
            "content": { "code": "c", "image": "img1" }
        });
        let step = StepEvent::from_wire("s1", &wire).unwrap();
        let back: serde_json::Value = serde_json::from_str(&step.raw_payload).unwrap();
        assert_eq!(back["image"], "img1");
    }

    #[test]
    fn wire_non_tool_is_ignored() {
        let wire = serde_json::json!({ "type": "ai", "name": "x", "content": "hi" });
        assert!(StepEvent::from_wire("s1", &wire).is_none());
        assert!(StepEvent::from_wire("s1", &serde_json::json!("garbage")).is_none());
    }

    #[test]
    fn classified_event_kinds() {
        let chart = ClassifiedEvent::ChartResult {
            code: "c".into(),
            image_ref: "id".into(),
        };
        assert_eq!(chart.kind(), EventKind::ChartResult);
        assert_eq!(chart.kind().to_string(), "chart_result");
        let unknown = ClassifiedEvent::Unknown {
            source_name: "sql_db_schema".into(),
        };
        assert_eq!(unknown.kind(), EventKind::Unknown);
    }
}
