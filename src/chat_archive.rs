//! On-disk archive of full chat transcripts, grouped by character.
//!
//! Layout under the data root:
//!
//! ```text
//! chats/
//!   <character>/
//!     _info.json      # Vec<ChatInfo>, the character's chat index
//!     <chat id>.json  # ArchivedChat (info + messages)
//! ```
//!
//! Every file is written to a sibling temp file and renamed into place, so
//! readers see either the old or the new version. Each character directory
//! has its own lock; different characters never contend.

use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use recall_core::models::{ArchivedChat, ChatInfo, ChatTranscript};
use recall_core::{Error, Result};

const INDEX_FILE: &str = "_info.json";

pub struct ChatArchive {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl ChatArchive {
    /// Archive rooted at `<data root>/chats`.
    pub fn new(data_root: &Path) -> Self {
        Self {
            root: data_root.join("chats"),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, character: &str) -> Result<Arc<RwLock<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| Error::Storage("chat archive lock poisoned".into()))?;
        Ok(locks
            .entry(character.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone())
    }

    fn character_dir(&self, character: &str) -> PathBuf {
        self.root.join(character)
    }

    fn chat_path(&self, character: &str, id: &str) -> PathBuf {
        self.character_dir(character).join(format!("{}.json", id))
    }

    /// Store `transcript` under `character`, replacing any previous version.
    ///
    /// `created_at` survives overwrites; `updated_at` is always now.
    pub async fn save(&self, character: &str, transcript: &ChatTranscript) -> Result<ChatInfo> {
        validate_name("character", character)?;
        validate_name("chat id", &transcript.id)?;

        let lock = self.lock_for(character)?;
        let _guard = lock.write().await;

        let dir = self.character_dir(character);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::storage(&format!("create {}", dir.display()), e))?;

        let index_path = dir.join(INDEX_FILE);
        let mut index: Vec<ChatInfo> = read_json(&index_path).await?.unwrap_or_default();

        let chat_path = self.chat_path(character, &transcript.id);
        let previous: Option<ArchivedChat> = read_json(&chat_path).await?;

        let now = Utc::now();
        let created_at = previous
            .map(|p| p.info.created_at)
            .or_else(|| {
                index
                    .iter()
                    .find(|c| c.id == transcript.id)
                    .map(|c| c.created_at)
            })
            .unwrap_or(now);
        let info = ChatInfo {
            id: transcript.id.clone(),
            title: transcript.title.clone(),
            character: character.to_string(),
            created_at,
            updated_at: now,
            message_count: transcript.messages.len(),
        };

        let archived = ArchivedChat {
            info: info.clone(),
            messages: transcript.messages.clone(),
        };
        write_json_atomic(&chat_path, &archived).await?;

        match index.iter_mut().find(|c| c.id == info.id) {
            Some(entry) => *entry = info.clone(),
            None => index.push(info.clone()),
        }
        write_json_atomic(&index_path, &index).await?;

        info!(character, chat_id = %info.id, messages = info.message_count, "chat archived");
        Ok(info)
    }

    pub async fn get(&self, character: &str, id: &str) -> Result<ArchivedChat> {
        validate_name("character", character)?;
        validate_name("chat id", id)?;

        let lock = self.lock_for(character)?;
        let _guard = lock.read().await;

        read_json(&self.chat_path(character, id))
            .await?
            .ok_or_else(|| Error::NotFound(format!("chat {}/{}", character, id)))
    }

    pub async fn delete(&self, character: &str, id: &str) -> Result<()> {
        validate_name("character", character)?;
        validate_name("chat id", id)?;

        let lock = self.lock_for(character)?;
        let result = {
            let _guard = lock.write().await;
            self.remove_chat(character, id).await
        };
        drop(lock);
        self.release_lock(character);
        result
    }

    async fn remove_chat(&self, character: &str, id: &str) -> Result<()> {
        let path = self.chat_path(character, id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(Error::NotFound(format!("chat {}/{}", character, id)))
            }
            Err(e) => return Err(Error::storage(&format!("remove {}", path.display()), e)),
        }

        let index_path = self.character_dir(character).join(INDEX_FILE);
        let mut index: Vec<ChatInfo> = read_json(&index_path).await?.unwrap_or_default();
        index.retain(|c| c.id != id);
        write_json_atomic(&index_path, &index).await?;

        debug!(character, chat_id = id, "chat removed from archive");
        Ok(())
    }

    /// Drop the character's lock when no task holds it.
    fn release_lock(&self, character: &str) {
        if let Ok(mut locks) = self.locks.lock() {
            if locks
                .get(character)
                .is_some_and(|l| Arc::strong_count(l) == 1)
            {
                locks.remove(character);
            }
        }
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Characters with an archive directory, sorted by name.
    pub async fn list_characters(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::storage(&format!("read {}", self.root.display()), e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::storage("read chat archive", e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// A character's chats, most recently updated first.
    pub async fn list_chats(&self, character: &str) -> Result<Vec<ChatInfo>> {
        validate_name("character", character)?;

        let lock = self.lock_for(character)?;
        let _guard = lock.read().await;

        let index_path = self.character_dir(character).join(INDEX_FILE);
        let mut index: Vec<ChatInfo> = read_json(&index_path).await?.unwrap_or_default();
        index.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(index)
    }
}

/// Names become path components.
fn validate_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name == INDEX_FILE.trim_end_matches(".json")
    {
        return Err(Error::InvalidInput(format!("invalid {}: {:?}", what, name)));
    }
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::storage(&format!("read {}", path.display()), e)),
    }
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| Error::storage(&format!("write {}", tmp.display()), e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
            warn!(path = %tmp.display(), error = %cleanup, "failed to remove temp file");
        }
        return Err(Error::storage(&format!("write {}", path.display()), e));
    }
    Ok(())
}
