//! `recall chat ...` commands over the archive and the chat index.

use std::path::Path;

use anyhow::{Context, Result};

use recall_core::chat::{recent_messages, render_transcript};
use recall_core::models::ChatTranscript;

use crate::app::Services;

/// Archive and index a transcript read from a JSON file.
pub async fn run_chat_ingest(services: &Services, character: &str, file: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let transcript: ChatTranscript = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse transcript {}", file.display()))?;

    let outcome = services
        .ingestor
        .ingest_transcript(character, transcript)
        .await?;

    println!("chat {}/{}", character, outcome.info.id);
    println!("  title:    {}", outcome.info.title);
    println!("  messages: {}", outcome.info.message_count);
    println!("  chunks:   {}", outcome.report.chunk_count());
    if outcome.replaced > 0 {
        println!("  replaced: {}", outcome.replaced);
    }
    Ok(())
}

pub async fn run_chat_characters(services: &Services) -> Result<()> {
    let characters = services.archive.list_characters().await?;
    if characters.is_empty() {
        println!("No characters.");
    }
    for name in characters {
        println!("{}", name);
    }
    Ok(())
}

pub async fn run_chat_list(services: &Services, character: &str) -> Result<()> {
    let chats = services.archive.list_chats(character).await?;
    if chats.is_empty() {
        println!("No chats for {}.", character);
        return Ok(());
    }
    for info in chats {
        println!(
            "{}  {}  ({} messages, updated {})",
            info.id,
            info.title,
            info.message_count,
            info.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

/// Print a transcript in the same role-prefixed form used for indexing.
pub async fn run_chat_show(
    services: &Services,
    character: &str,
    id: &str,
    last: Option<usize>,
) -> Result<()> {
    let transcript = services.archive.get(character, id).await?.into_transcript();
    let transcript = recent_messages(&transcript, last.unwrap_or(0));
    print!("{}", render_transcript(&transcript));
    Ok(())
}

pub async fn run_chat_forget(services: &Services, character: &str, id: &str) -> Result<()> {
    let removed = services.ingestor.forget_chat(character, id).await?;
    println!("Forgot chat {}/{} ({} chunks removed)", character, id, removed);
    Ok(())
}
