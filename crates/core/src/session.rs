//! Rendered session messages: the replayable history of a conversation.
//!
//! A [`SessionMessage`] is the compact record a dispatch handler appends
//! after rendering something. For [`MessageKind::Image`] the content is an
//! artifact id; the encoded image stays in the artifact store.

use crate::handler::HandlerOp;
use serde::{Deserialize, Serialize};

/// Who produced a rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// The closed set of rendered message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Sql,
    Image,
    ChartCode,
    Table,
}

impl MessageKind {
    /// The wire tag (`"text"`, `"sql"`, `"image"`, `"chart_code"`, `"table"`).
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Sql => "sql",
            Self::Image => "image",
            Self::ChartCode => "chart_code",
            Self::Table => "table",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(Self::Text),
            "sql" => Some(Self::Sql),
            "image" => Some(Self::Image),
            "chart_code" => Some(Self::ChartCode),
            "table" => Some(Self::Table),
            _ => None,
        }
    }

    /// The handler operation that renders this kind on replay.
    pub fn operation(&self) -> HandlerOp {
        match self {
            Self::Sql => HandlerOp::Sql,
            Self::Image => HandlerOp::Chart,
            Self::ChartCode => HandlerOp::ChartCode,
            Self::Text => HandlerOp::LastMessage,
            Self::Table => HandlerOp::Data,
        }
    }
}

/// One rendered entry in a session's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: MessageRole,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
}

impl SessionMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            kind: MessageKind::Text,
            content: text.into(),
        }
    }

    pub fn assistant(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            kind,
            content: content.into(),
        }
    }
}
