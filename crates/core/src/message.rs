//! Message types.
//!
//! Messages are what flows to the model and what the workflow appends to its
//! audit trail. Every stage tags the messages it adds with a `stage` metadata
//! entry so the trail can be read back per stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The requesting side (prompts, feedback)
    User,
    /// The model
    Assistant,
    /// System instructions and audit notes
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Optional metadata (stage, score, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Tag the message with the stage that produced it.
    pub fn from_stage(mut self, stage: &str) -> Self {
        self.metadata
            .insert("stage".into(), serde_json::Value::String(stage.to_string()));
        self
    }

    /// The stage tag, if any.
    pub fn stage(&self) -> Option<&str> {
        self.metadata.get("stage").and_then(|v| v.as_str())
    }
}

/// The last `limit` non-system messages, oldest first.
///
/// Used wherever prior conversation is replayed to a model: audit notes are
/// system messages and never leak back into prompts.
pub fn recent_dialogue(messages: &[Message], limit: usize) -> Vec<Message> {
    let dialogue: Vec<&Message> = messages.iter().filter(|m| m.role != Role::System).collect();
    let start = dialogue.len().saturating_sub(limit);
    dialogue[start..].iter().map(|m| (*m).clone()).collect()
}
