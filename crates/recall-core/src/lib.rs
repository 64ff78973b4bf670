//! # Recall Core
//!
//! Shared, I/O-free logic for Recall: data models, the paragraph/sentence
//! chunker, the embedding capability, the vector store trait with typed
//! filters, similarity ranking, chat transcript rendering, and error kinds.
//!
//! This crate contains no tokio, sqlx, or filesystem dependencies. Durable
//! backends live in the `recall` application crate; [`store::memory`]
//! provides an in-memory backend for tests and embedding in other programs.

pub mod chat;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod search;
pub mod store;

pub use error::{Error, ErrorKind, Result};
