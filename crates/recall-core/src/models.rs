//! Core data models used throughout Recall.
//!
//! These types represent the stored document fragments, chat transcripts,
//! and the caller-facing ingestion/query payloads.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fixed-length embedding vector.
pub type Vector = Vec<f32>;

/// One stored fragment of a larger source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

/// Descriptive metadata carried by every [`Document`].
///
/// All fragments of one logical source share `source`, `title`, and
/// `chunk_count`; `chunk_index` is the fragment's position within it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub source: String,
    pub title: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
    pub chunk_index: usize,
    pub chunk_count: usize,
}

impl Metadata {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    System,
    Other(String),
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::Other(s),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::User => "user".to_string(),
            Role::Assistant => "assistant".to_string(),
            Role::System => "system".to_string(),
            Role::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Free-form timestamp as supplied by the chat client.
    #[serde(default, alias = "time", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// The full ordered history of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTranscript {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub messages: Vec<ChatMessage>,
}

/// Summary of one archived transcript, as kept in a character's index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub id: String,
    pub title: String,
    pub character: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// On-disk shape of an archived transcript: info block plus messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedChat {
    pub info: ChatInfo,
    pub messages: Vec<ChatMessage>,
}

impl ArchivedChat {
    pub fn into_transcript(self) -> ChatTranscript {
        ChatTranscript {
            id: self.info.id,
            title: self.info.title,
            messages: self.messages,
        }
    }
}

/// DataBank ingestion payload: `{name, content, type}` plus optional tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub name: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Query payload: `{query, limit}`. A non-positive limit means "default".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub limit: i64,
}

/// One ranked result in the caller-facing shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResultItem {
    pub id: String,
    pub content: String,
    pub title: String,
    pub source: String,
    pub score: f32,
}
