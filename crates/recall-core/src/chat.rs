//! Chat transcript rendering and metadata.
//!
//! Turns a [`ChatTranscript`] into a single role-prefixed text blob for
//! chunking, derives the custom metadata attached to every chat fragment,
//! and formats retrieved fragments as a context block for prompts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::{ChatTranscript, Role};

/// `metadata.source` of every document produced from a chat.
pub const CHAT_SOURCE: &str = "character_chat";

/// Render a transcript as chronological, role-prefixed text.
///
/// ```text
/// Chat title: <title>
///
/// User: [10:02]
/// hello
///
/// Assistant:
/// hi there
/// ```
pub fn render_transcript(transcript: &ChatTranscript) -> String {
    let mut out = format!("Chat title: {}\n\n", transcript.title);
    for msg in &transcript.messages {
        out.push_str(&role_prefix(&msg.role));
        if let Some(ts) = msg.timestamp.as_deref().filter(|t| !t.is_empty()) {
            out.push_str(&format!(" [{}]", ts));
        }
        out.push('\n');
        out.push_str(&msg.content);
        out.push_str("\n\n");
    }
    out
}

fn role_prefix(role: &Role) -> String {
    match role {
        Role::User => "User:".to_string(),
        Role::Assistant => "Assistant:".to_string(),
        Role::System => "System:".to_string(),
        Role::Other(name) => format!("{}:", name),
    }
}

/// Custom metadata attached to every fragment of an ingested chat.
///
/// Keys: `title`, `chat_id`, `character`, `message_count`, `upload_time`,
/// and `start_time`/`end_time` when the first/last messages carry
/// timestamps.
pub fn chat_metadata(
    transcript: &ChatTranscript,
    character: &str,
    now: DateTime<Utc>,
) -> BTreeMap<String, String> {
    let mut custom = BTreeMap::new();
    custom.insert("title".to_string(), transcript.title.clone());
    custom.insert("chat_id".to_string(), transcript.id.clone());
    custom.insert("character".to_string(), character.to_string());
    custom.insert(
        "message_count".to_string(),
        transcript.messages.len().to_string(),
    );
    custom.insert("upload_time".to_string(), now.to_rfc3339());

    let first = transcript.messages.first().and_then(|m| m.timestamp.as_ref());
    let last = transcript.messages.last().and_then(|m| m.timestamp.as_ref());
    if let Some(t) = first.filter(|t| !t.is_empty()) {
        custom.insert("start_time".to_string(), t.clone());
    }
    if let Some(t) = last.filter(|t| !t.is_empty()) {
        custom.insert("end_time".to_string(), t.clone());
    }
    custom
}

/// Title used when a transcript arrives without one.
pub fn default_title(character: &str, now: DateTime<Utc>) -> String {
    format!("{} chat {}", character, now.format("%Y-%m-%d %H:%M:%S"))
}

/// Keep only the last `n` messages; `n == 0` keeps everything.
pub fn recent_messages(transcript: &ChatTranscript, n: usize) -> ChatTranscript {
    if n == 0 || transcript.messages.len() <= n {
        return transcript.clone();
    }
    ChatTranscript {
        id: transcript.id.clone(),
        title: transcript.title.clone(),
        messages: transcript.messages[transcript.messages.len() - n..].to_vec(),
    }
}

/// Format retrieved fragments as a numbered context block.
pub fn format_context<S: AsRef<str>>(fragments: &[S], source: &str) -> String {
    let mut out = format!("\n\n[Relevant information from {}]\n", source);
    for (i, fragment) in fragments.iter().enumerate() {
        out.push_str(&format!("{}. {}\n\n", i + 1, fragment.as_ref()));
    }
    out
}
