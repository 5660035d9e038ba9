//! Key-value persistence behind the domain store.
//!
//! Models the host's persistent storage area: string keys to JSON values,
//! with change notifications. Domain state lives under keys prefixed
//! `vfs:`; scalar configuration uses reserved, unprefixed keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

use pagehands_protocols::error::StoreError;

/// Prefix for per-domain VFS state keys.
pub const VFS_KEY_PREFIX: &str = "vfs:";

/// Storage key for a domain's VFS state.
pub fn domain_key(domain: &str) -> String {
    format!("{VFS_KEY_PREFIX}{domain}")
}

/// A change event for one key.
#[derive(Debug, Clone)]
pub struct StoreChange {
    pub key: String,
}

impl StoreChange {
    pub fn is_vfs(&self) -> bool {
        self.key.starts_with(VFS_KEY_PREFIX)
    }
}

/// Persistent key-value store with change notifications.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Subscribe to change events. Every successful `set`/`remove`
    /// publishes the affected key.
    fn changes(&self) -> broadcast::Receiver<StoreChange>;
}

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// In-memory store for tests and ephemeral sessions.
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Value>>,
    tx: broadcast::Sender<StoreChange>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            tx,
        }
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value);
        let _ = self.tx.send(StoreChange {
            key: key.to_string(),
        });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let removed = self.entries.write().remove(key).is_some();
        if removed {
            let _ = self.tx.send(StoreChange {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.tx.subscribe()
    }
}

/// On-disk store: one JSON file per key.
///
/// The original key is carried inside the envelope, so file names only
/// need to be collision-free, not reversible.
pub struct FileKvStore {
    dir: PathBuf,
    tx: broadcast::Sender<StoreChange>,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    key: String,
    value: Value,
}

impl FileKvStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self { dir, tx })
    }

    fn file_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        let mut utf8 = [0u8; 4];
        for ch in key.chars() {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                name.push(ch);
            } else {
                // Percent-encode every UTF-8 byte so distinct keys never
                // collide on disk.
                for byte in ch.encode_utf8(&mut utf8).as_bytes() {
                    name.push_str(&format!("%{byte:02X}"));
                }
            }
        }
        self.dir.join(format!("{name}.json"))
    }

    async fn read_envelope(path: &Path) -> Option<Envelope> {
        let bytes = tokio::fs::read(path).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                warn!(path = %path.display(), %err, "skipping unreadable store file");
                None
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.file_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Self::read_envelope(&path).await.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let envelope = Envelope {
            key: key.to_string(),
            value,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        tokio::fs::write(self.file_for(key), bytes).await?;
        let _ = self.tx.send(StoreChange {
            key: key.to_string(),
        });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.file_for(key);
        if path.exists() {
            tokio::fs::remove_file(path).await?;
            let _ = self.tx.send(StoreChange {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(envelope) = Self::read_envelope(&path).await {
                keys.push(envelope.key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "kv_tests.rs"]
mod tests;
