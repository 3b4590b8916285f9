use std::collections::HashMap as StdHashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};

use super::BridgeCache;

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process bridge cache: bridge id -> real session id, each entry bounded by its TTL.
///
/// Expired entries are invisible to `get` immediately and physically removed either lazily on
/// read or by `sweep`.
#[derive(Clone, Default)]
pub struct MemoryBridgeCache {
    map: Arc<parking_lot::RwLock<StdHashMap<String, Entry>>>,
}

#[derive(Serialize, Deserialize)]
struct SnapEntry { key: String, value: String, remaining_ms: u64 }

#[derive(Serialize, Deserialize)]
struct Snapshot { version: u32, created_ms: i64, entries: Vec<SnapEntry> }

impl MemoryBridgeCache {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.map.read().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Remove expired keys. Returns number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut w = self.map.write();
        let before = w.len();
        w.retain(|_, e| now < e.expires_at);
        before - w.len()
    }

    /// Write live entries with their remaining lifetime. Written via a temp file and rename.
    pub fn save_snapshot(&self, path: &Path) -> anyhow::Result<usize> {
        let now = Instant::now();
        let entries: Vec<SnapEntry> = self.map.read().iter()
            .filter(|(_, e)| now < e.expires_at)
            .map(|(k, e)| SnapEntry {
                key: k.clone(),
                value: e.value.clone(),
                remaining_ms: e.expires_at.saturating_duration_since(now).as_millis() as u64,
            })
            .collect();
        let n = entries.len();
        let snap = Snapshot { version: 1, created_ms: chrono::Utc::now().timestamp_millis(), entries };
        let bytes = bincode::serialize(&snap)?;
        if let Some(dir) = path.parent() { std::fs::create_dir_all(dir).ok(); }
        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(tmp, path)?;
        Ok(n)
    }

    /// Load a snapshot into memory, replacing current contents. Time spent on disk counts
    /// against each entry's TTL. A missing file is not an error.
    pub fn load_snapshot(&self, path: &Path) -> anyhow::Result<usize> {
        if !path.exists() { return Ok(0); }
        let bytes = std::fs::read(path)?;
        let snap: Snapshot = bincode::deserialize(&bytes)?;
        let offline_ms = (chrono::Utc::now().timestamp_millis() - snap.created_ms).max(0) as u64;
        let now = Instant::now();
        let mut w = self.map.write();
        w.clear();
        for e in snap.entries.into_iter() {
            let Some(left) = e.remaining_ms.checked_sub(offline_ms).filter(|ms| *ms > 0) else { continue; };
            w.insert(e.key, Entry { value: e.value, expires_at: now + Duration::from_millis(left) });
        }
        Ok(w.len())
    }
}

impl BridgeCache for MemoryBridgeCache {
    /// Get a key. If expired, removes it and returns None.
    fn get(&self, key: &str) -> Option<String> {
        {
            let r = self.map.read();
            match r.get(key) {
                Some(ent) if Instant::now() < ent.expires_at => return Some(ent.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut w = self.map.write();
        if w.get(key).map(|e| Instant::now() >= e.expires_at).unwrap_or(false) {
            w.remove(key);
        }
        None
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) {
        let ent = Entry { value: value.to_string(), expires_at: Instant::now() + ttl };
        self.map.write().insert(key.to_string(), ent);
    }
}
