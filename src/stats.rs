//! Store statistics and health overview for `recall stats`.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;

use recall_core::store::VectorStore;

use crate::app::Services;

#[derive(Default)]
struct SourceStats {
    chunks: usize,
    titles: BTreeSet<String>,
}

pub async fn run_stats(services: &Services) -> Result<()> {
    let config = &services.config;
    let total = services.store.count().await?;
    let docs = services.store.list().await?;

    let mut by_source: BTreeMap<String, SourceStats> = BTreeMap::new();
    for doc in &docs {
        let entry = by_source.entry(doc.metadata.source.clone()).or_default();
        entry.chunks += 1;
        entry.titles.insert(doc.metadata.title.clone());
    }

    let db_size = tokio::fs::metadata(config.storage.db_path())
        .await
        .map(|m| m.len())
        .unwrap_or(0);

    let characters = services.archive.list_characters().await?;
    let mut chat_count = 0;
    for character in &characters {
        chat_count += services.archive.list_chats(character).await?.len();
    }

    println!("Recall: Store Stats");
    println!("===================");
    println!();
    println!("  Data dir:    {}", config.storage.path.display());
    println!("  Database:    {}", format_bytes(db_size));
    println!(
        "  Embedding:   {} ({} dims)",
        services.provider.model_name(),
        services.store.dimension()
    );
    println!();
    println!("  Chunks:      {}", total);
    println!("  Characters:  {}", characters.len());
    println!("  Chats:       {}", chat_count);

    if !by_source.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<32} {:>8} {:>8}", "SOURCE", "TITLES", "CHUNKS");
        println!("  {}", "-".repeat(50));
        for (source, s) in &by_source {
            println!("  {:<32} {:>8} {:>8}", source, s.titles.len(), s.chunks);
        }
    }
    println!();
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
