//! Event classifier: turns raw step events into typed, routable events.
//!
//! The producer vocabulary is closed. Anything outside it is `Unknown` and
//! never reaches a handler.

use genbi_core::error::ClassificationError;
use genbi_core::step::{ClassifiedEvent, StepEvent, sources};
use serde_json::Value;

pub struct EventClassifier;

impl EventClassifier {
    /// Classify `event`. A pure function of its source name and payload.
    pub fn classify(event: &StepEvent) -> Result<ClassifiedEvent, ClassificationError> {
        let payload = &event.raw_payload;
        Ok(match event.source_name.as_str() {
            sources::SQL_QUERY_CHECKER => ClassifiedEvent::SqlQuery {
                sql: payload.clone(),
            },
            sources::TABLE_CONVERSION => ClassifiedEvent::TableConversion {
                csv: payload.clone(),
            },
            sources::CHART => Self::chart(&event.source_name, payload)?,
            sources::ASSISTANT => ClassifiedEvent::PlainText {
                text: payload.clone(),
            },
            other => ClassifiedEvent::Unknown {
                source_name: other.to_string(),
            },
        })
    }

    fn chart(source_name: &str, payload: &str) -> Result<ClassifiedEvent, ClassificationError> {
        let malformed = |reason: String| ClassificationError::MalformedPayload {
            source_name: source_name.to_string(),
            reason,
        };

        let value: Value = serde_json::from_str(payload).map_err(|e| malformed(e.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(malformed("expected a JSON object".into()));
        };

        let field = |name: &'static str| -> Result<String, ClassificationError> {
            match fields.get(name) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(_) => Err(malformed(format!("field '{name}' is not a string"))),
                None => Err(ClassificationError::MissingField {
                    source_name: source_name.to_string(),
                    field: name,
                }),
            }
        };

        // Both or neither: a half-decoded chart is never dispatched.
        let image_ref = field("image")?;
        let code = field("code")?;
        Ok(ClassifiedEvent::ChartResult { code, image_ref })
    }
}
