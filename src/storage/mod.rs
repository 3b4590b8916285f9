//! Bridge storage: the shared TTL key-value store linking broker session ids to real sessions.

use std::time::Duration;

pub mod kv;

/// Shared cache capability. Single-key `get`/`set` must be atomic; concurrent writers to the
/// same key resolve as last-write-wins.
pub trait BridgeCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str, ttl: Duration);
}

pub use kv::MemoryBridgeCache;
