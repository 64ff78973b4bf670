//! Process-wide service composition.
//!
//! The CLI opens one [`Services`] at startup and passes it to every command.
//! It owns the store lifecycle: [`Services::open`] connects and migrates,
//! [`Services::close`] shuts the pool down. Nothing else opens the store.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use recall_core::embedding::EmbeddingProvider;
use recall_core::store::VectorStore;

use crate::chat_archive::ChatArchive;
use crate::config::Config;
use crate::embedding::create_provider;
use crate::ingest::Ingestor;
use crate::search::QueryEngine;
use crate::sqlite_store::SqliteVectorStore;

pub struct Services {
    pub config: Config,
    pub store: Arc<SqliteVectorStore>,
    pub archive: Arc<ChatArchive>,
    pub provider: Arc<dyn EmbeddingProvider>,
    pub ingestor: Ingestor,
    pub query: QueryEngine,
}

impl Services {
    pub async fn open(config: &Config) -> Result<Self> {
        let dimension = config.embedding.dimension();
        if dimension == 0 {
            bail!("embedding.dims must be set to open the vector store");
        }

        let provider = create_provider(&config.embedding)?;
        if config.embedding.is_enabled() && provider.dims() != dimension {
            bail!(
                "embedding provider reports {} dimensions but embedding.dims is {}",
                provider.dims(),
                dimension
            );
        }

        let store = Arc::new(
            SqliteVectorStore::open(&config.storage, dimension)
                .await
                .with_context(|| {
                    format!("Failed to open store at {}", config.storage.path.display())
                })?,
        );
        let archive = Arc::new(ChatArchive::new(&config.storage.path));

        let dyn_store: Arc<dyn VectorStore> = store.clone();
        let ingestor = Ingestor::new(
            dyn_store.clone(),
            archive.clone(),
            provider.clone(),
            &config.chunking,
        );
        let query = QueryEngine::new(dyn_store, provider.clone(), config.retrieval.default_limit);

        Ok(Self {
            config: config.clone(),
            store,
            archive,
            provider,
            ingestor,
            query,
        })
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
