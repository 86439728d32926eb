//! Challenge store contract and the in-memory reference implementation.
//!
//! The store is the only shared mutable state on the init path. It must
//! guarantee at-most-once delete: two racing solves for the same challenge
//! see exactly one successful removal.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::types::ChallengeData;

/// TTL-indexed map from challenge id to challenge state.
///
/// Production replacements (e.g. a remote cache) must preserve the
/// `delete` contract: it reports whether an entry was actually removed,
/// and concurrent callers see exactly one `true`.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn set(&self, id: &str, data: ChallengeData, ttl: Duration) -> Result<()>;

    /// Fetch a live entry. Expired entries are indistinguishable from
    /// never-stored ones.
    async fn get(&self, id: &str) -> Result<Option<ChallengeData>>;

    /// Remove the entry, reporting whether it was present.
    async fn delete(&self, id: &str) -> Result<bool>;
}

struct Entry {
    data: ChallengeData,
    expires_at: Instant,
}

/// In-memory reference store: a mutex-guarded hash map with lazy eviction
/// on `get` plus an explicit [`MemoryStore::sweep`] for periodic cleanup.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Drop every expired entry. Returns how many were evicted.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl ChallengeStore for MemoryStore {
    async fn set(&self, id: &str, data: ChallengeData, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            id.to_owned(),
            Entry {
                data,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ChallengeData>> {
        let mut entries = self.entries.lock().await;
        match entries.get(id) {
            None => Ok(None),
            Some(entry) if entry.expires_at <= Instant::now() => {
                entries.remove(id);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.data.clone())),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        Ok(entries.remove(id).is_some())
    }
}
