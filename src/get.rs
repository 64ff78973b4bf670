//! Document-level commands: `get`, `list`, `delete`, `purge`.

use anyhow::{bail, Result};

use recall_core::store::VectorStore;

use crate::app::Services;
use crate::search::{excerpt, SearchScope};

pub async fn run_get(services: &Services, id: &str, json: bool) -> Result<()> {
    let doc = services.store.get(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    let meta = &doc.metadata;
    let tags: Vec<&str> = meta.tags.iter().map(String::as_str).collect();

    println!("--- Document ---");
    println!("id:       {}", doc.id);
    println!(
        "title:    {}",
        if meta.title.is_empty() {
            "(untitled)"
        } else {
            meta.title.as_str()
        }
    );
    println!("source:   {}", meta.source);
    println!("tags:     {}", tags.join(", "));
    println!("chunk:    {} of {}", meta.chunk_index + 1, meta.chunk_count);
    for (key, value) in &meta.custom {
        println!("{:<9} {}", format!("{}:", key), value);
    }
    println!();
    println!("--- Content ---");
    println!("{}", doc.content);

    Ok(())
}

pub async fn run_list(services: &Services, scope: &SearchScope) -> Result<()> {
    let filter = scope.to_filter();
    let docs = services.store.list_where(&filter).await?;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in &docs {
        println!(
            "{}  {} / {} [{}/{}]  \"{}\"",
            doc.id,
            doc.metadata.source,
            doc.metadata.title,
            doc.metadata.chunk_index + 1,
            doc.metadata.chunk_count,
            excerpt(&doc.content, 60).replace('\n', " ")
        );
    }
    println!("{} document(s)", docs.len());
    Ok(())
}

pub async fn run_delete(services: &Services, id: &str) -> Result<()> {
    services.store.delete(id).await?;
    println!("Deleted {}", id);
    Ok(())
}

/// Bulk delete by tag and/or source. At least one of them is required.
pub async fn run_purge(services: &Services, scope: &SearchScope) -> Result<()> {
    if scope.tag.is_none() && scope.source.is_none() && scope.character.is_none() {
        bail!("purge needs --tag, --source, or --character");
    }
    let removed = services.store.delete_where(&scope.to_filter()).await?;
    println!("Purged {} document(s)", removed.len());
    Ok(())
}
