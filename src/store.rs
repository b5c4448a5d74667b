//! Durable ordered log of received messages with read/unread state.
//!
//! The store is independent of the push channel: entries are created on
//! receipt and live through disconnects, reconnects, and process restarts.
//! Durability goes through the [`KeyValueStore`] collaborator; every
//! mutation persists the full sequence before returning (write-through).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::{PushMessage, StoredNotification};

/// Storage key used when none is configured.
pub const DEFAULT_STORE_KEY: &str = "planner.notifications";

/// Persistent key-value collaborator (browser-local storage or equivalent).
///
/// `set` is fire-and-forget to match the surface the store was written
/// against; implementations log failures rather than returning them.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// In-memory [`KeyValueStore`], for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("kv store poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("kv store poisoned")
            .insert(key.to_string(), value.to_string());
    }
}

/// File-backed [`KeyValueStore`]: one JSON file per key under a root
/// directory. The process-restart durability option.
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> crate::error::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            crate::error::PlannerLinkError::Storage(format!(
                "cannot create '{}': {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.root.join(format!("{}.json", safe))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &str) {
        let path = self.path_for(key);
        if let Err(e) = std::fs::write(&path, value) {
            log::warn!("[STORE] Failed to persist '{}': {}", path.display(), e);
        }
    }
}

struct StoreInner {
    entries: Vec<StoredNotification>,
    seq: u64,
}

/// Ordered, persisted record of all messages ever received.
///
/// Most-recent-first ordering; every operation is total (`remove` /
/// `mark_read` on an unknown id is a no-op). Safe to share behind an
/// `Arc` and call from the channel's dispatch thread.
pub struct NotificationStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    inner: Mutex<StoreInner>,
}

impl NotificationStore {
    /// Open a store over `kv` under [`DEFAULT_STORE_KEY`], recovering any
    /// persisted sequence.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(kv, DEFAULT_STORE_KEY)
    }

    /// Open a store over `kv` under an explicit storage key.
    pub fn with_key(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let entries = Self::recover(kv.as_ref(), &key);
        let seq = entries.len() as u64;
        Self {
            kv,
            key,
            inner: Mutex::new(StoreInner { entries, seq }),
        }
    }

    /// Load the persisted sequence, skipping entries that fail to
    /// deserialize individually: one corrupt entry must not discard the
    /// whole store.
    fn recover(kv: &dyn KeyValueStore, key: &str) -> Vec<StoredNotification> {
        let Some(raw) = kv.get(key) else {
            return Vec::new();
        };
        let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(values) => values,
            Err(e) => {
                log::warn!("[STORE] Persisted sequence unreadable, starting empty: {}", e);
                return Vec::new();
            }
        };

        let total = values.len();
        let entries: Vec<StoredNotification> = values
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("[STORE] Skipping corrupt notification entry: {}", e);
                    None
                }
            })
            .collect();
        if entries.len() < total {
            log::warn!(
                "[STORE] Recovered {} of {} persisted notifications",
                entries.len(),
                total
            );
        } else {
            log::debug!("[STORE] Recovered {} notifications", entries.len());
        }
        entries
    }

    /// Record a received message: assigns a unique generation-ordered id,
    /// prepends (most-recent-first), marks unread, persists. Returns the
    /// assigned id.
    pub fn add(&self, message: PushMessage) -> String {
        let mut inner = self.inner.lock().expect("notification store poisoned");
        inner.seq += 1;
        let id = format!("ntf_{}_{:04}", now_nanos(), inner.seq);
        let entry = StoredNotification::from_message(id.clone(), message, now_ms());
        inner.entries.insert(0, entry);
        self.persist(&inner);
        id
    }

    /// Remove one entry. No-op on an unknown id.
    pub fn remove(&self, id: &str) {
        let mut inner = self.inner.lock().expect("notification store poisoned");
        let before = inner.entries.len();
        inner.entries.retain(|entry| entry.id != id);
        if inner.entries.len() != before {
            self.persist(&inner);
        }
    }

    /// Mark one entry read. No-op on an unknown id.
    pub fn mark_read(&self, id: &str) {
        let mut inner = self.inner.lock().expect("notification store poisoned");
        let mut changed = false;
        if let Some(entry) = inner.entries.iter_mut().find(|entry| entry.id == id) {
            changed = !entry.read;
            entry.read = true;
        }
        if changed {
            self.persist(&inner);
        }
    }

    /// Mark every entry read.
    pub fn mark_all_read(&self) {
        let mut inner = self.inner.lock().expect("notification store poisoned");
        for entry in inner.entries.iter_mut() {
            entry.read = true;
        }
        self.persist(&inner);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("notification store poisoned");
        inner.entries.clear();
        self.persist(&inner);
    }

    /// Number of unread entries. Derived, never cached past a mutation.
    pub fn unread_count(&self) -> usize {
        self.inner
            .lock()
            .expect("notification store poisoned")
            .entries
            .iter()
            .filter(|entry| !entry.read)
            .count()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("notification store poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current sequence, most-recent-first.
    pub fn snapshot(&self) -> Vec<StoredNotification> {
        self.inner.lock().expect("notification store poisoned").entries.clone()
    }

    fn persist(&self, inner: &StoreInner) {
        match serde_json::to_string(&inner.entries) {
            Ok(serialized) => self.kv.set(&self.key, &serialized),
            Err(e) => log::warn!("[STORE] Failed to serialize notifications: {}", e),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}
