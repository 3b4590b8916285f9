use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use base64::Engine;
use serde_json::Value as JsonValue;
use crate::error::{AppError, AppResult};
use crate::tprintln;

/// Key under which the authenticated username is kept in a server session.
pub const USER_KEY: &str = "sso_user";

/// Storage engine behind server sessions. Implementations must make single-key
/// operations atomic; concurrent access to one session id is their concern.
pub trait SessionStore: Send + Sync {
    /// Create a live session and return its fresh, unguessable id.
    fn create(&self) -> AppResult<String>;
    fn exists(&self, id: &str) -> bool;
    fn get(&self, id: &str, key: &str) -> Option<JsonValue>;
    /// Store a value; `Null` removes the key. Unknown ids are created on write.
    fn set(&self, id: &str, key: &str, value: JsonValue);
    fn remove(&self, id: &str) -> bool;
}

#[derive(Debug)]
struct SessionEntry {
    attrs: HashMap<String, JsonValue>,
    expires_at: Instant,
}

pub(crate) fn gen_id() -> AppResult<String> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| {
        tracing::error!(target: "sso", "random source unavailable: {}", e);
        AppError::internal("session_id_unavailable", "Unable to create session")
    })?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// In-memory session store with sliding expiry.
pub struct MemorySessionStore {
    pub ttl: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self { Self::new(Duration::from_secs(24 * 60 * 60)) }
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()) }
    }

    /// Remove expired sessions. Returns number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut w = self.sessions.write();
        let before = w.len();
        w.retain(|_, e| e.expires_at > now);
        before - w.len()
    }

    pub fn len(&self) -> usize { self.sessions.read().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl SessionStore for MemorySessionStore {
    fn create(&self) -> AppResult<String> {
        let id = gen_id()?;
        let entry = SessionEntry { attrs: HashMap::new(), expires_at: Instant::now() + self.ttl };
        self.sessions.write().insert(id.clone(), entry);
        tprintln!("session.create sid={} ttl_secs={}", id, self.ttl.as_secs());
        Ok(id)
    }

    fn exists(&self, id: &str) -> bool {
        let now = Instant::now();
        let mut w = self.sessions.write();
        let expired = match w.get_mut(id) {
            Some(e) if e.expires_at > now => {
                e.expires_at = now + self.ttl;
                return true;
            }
            Some(_) => true,
            None => false,
        };
        if expired { w.remove(id); }
        false
    }

    fn get(&self, id: &str, key: &str) -> Option<JsonValue> {
        if !self.exists(id) { return None; }
        self.sessions.read().get(id).and_then(|e| e.attrs.get(key).cloned())
    }

    fn set(&self, id: &str, key: &str, value: JsonValue) {
        let expires_at = Instant::now() + self.ttl;
        let mut w = self.sessions.write();
        let entry = w.entry(id.to_string()).or_insert_with(|| SessionEntry { attrs: HashMap::new(), expires_at });
        entry.expires_at = expires_at;
        if value.is_null() {
            entry.attrs.remove(key);
        } else {
            entry.attrs.insert(key.to_string(), value);
        }
    }

    fn remove(&self, id: &str) -> bool {
        self.sessions.write().remove(id).is_some()
    }
}

/// The server session as seen by one request.
///
/// A session is active when the request carried a cookie naming a live session, or when the
/// handler has since started or resumed one.
pub struct Session {
    store: Arc<dyn SessionStore>,
    id: Option<String>,
    started: bool,
}

impl Session {
    /// Bind to the session named by the request cookie, if it is still live.
    pub fn from_cookie(store: Arc<dyn SessionStore>, cookie_id: Option<String>) -> Self {
        let id = cookie_id.filter(|id| store.exists(id));
        Self { store, id, started: false }
    }

    pub fn is_active(&self) -> bool { self.id.is_some() }

    pub fn current_id(&self) -> Option<&str> { self.id.as_deref() }

    /// True when this request created the session; the response must then set the cookie.
    pub fn was_started(&self) -> bool { self.started }

    /// Start a session unless one is already active; returns its id.
    pub fn start(&mut self) -> AppResult<String> {
        if let Some(id) = &self.id { return Ok(id.clone()); }
        let id = self.store.create()?;
        self.id = Some(id.clone());
        self.started = true;
        Ok(id)
    }

    /// Continue an existing session by id. The id need not be live; reads on an expired
    /// session simply come back empty.
    pub fn resume(&mut self, id: &str) {
        self.id = Some(id.to_string());
    }

    pub fn get(&self, key: &str) -> Option<JsonValue> {
        let id = self.id.as_deref()?;
        self.store.get(id, key)
    }

    pub fn set(&mut self, key: &str, value: JsonValue) -> AppResult<()> {
        let id = self.start()?;
        self.store.set(&id, key, value);
        Ok(())
    }

    /// Username stored by a successful login, if any.
    pub fn user(&self) -> Option<String> {
        self.get(USER_KEY).and_then(|v| v.as_str().map(|s| s.to_string()))
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
