//! # Recall
//!
//! A local-first document and chat-transcript retrieval engine for
//! retrieval-augmented generation.
//!
//! Recall chunks text (documents, DataBank entries, chat transcripts),
//! embeds every fragment, stores fragment + vector durably, and answers
//! nearest-neighbour queries by cosine similarity. Chat transcripts are also
//! archived verbatim per character so raw history survives independently of
//! the index.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ Files/Chats │──▶│  Ingestor    │──▶│ SqliteVectorStore │
//! │  DataBank   │   │ Chunk+Embed  │   │  kv + .vec files  │
//! └──────┬──────┘   └──────────────┘   └────────┬─────────┘
//!        │                                      │
//!        ▼                                      ▼
//! ┌─────────────┐                       ┌──────────────┐
//! │ ChatArchive │                       │ QueryEngine  │──▶ CLI (recall)
//! └─────────────┘                       └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! recall init
//! recall ingest notes/dragons.md --tag lore
//! recall chat ingest Aria chats/c1.json
//! recall search "where do dragons sleep" --limit 3
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`sqlite_store`] | Durable vector store |
//! | [`chat_archive`] | Per-character transcript archive |
//! | [`embedding`] | Embedding providers |
//! | [`extract`] | Text extraction from files |
//! | [`ingest`] | Ingestion pipeline |
//! | [`search`] | Query pipeline |
//! | [`app`] | Service composition and lifecycle |
//!
//! Pure logic (models, chunker, ranking, filters, errors) lives in
//! [`recall_core`] and is re-exported here.

pub mod app;
pub mod chat_archive;
pub mod chat_cmd;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod get;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod search;
pub mod sqlite_store;
pub mod stats;

pub use recall_core::{chat, chunk, error, models, store};
pub use recall_core::{Error, ErrorKind, Result};
