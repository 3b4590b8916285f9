//! Broker-scoped cookies carrying the client token.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;

static NAME_SANITIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_\W]+").expect("static cookie name pattern"));

/// `sso_token_` followed by the lowercased broker id with runs of `[_\W]` collapsed to `_`.
pub fn cookie_name(broker_id: &str) -> String {
    format!("sso_token_{}", NAME_SANITIZE_RE.replace_all(&broker_id.to_lowercase(), "_"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub max_age: Duration,
    pub path: String,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(name: &str, value: &str, max_age: Duration) -> Self {
        Self { name: name.to_string(), value: value.to_string(), max_age, path: "/".to_string(), http_only: true }
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let delta = chrono::Duration::from_std(self.max_age).unwrap_or_else(|_| chrono::Duration::zero());
        let expires = (chrono::Utc::now() + delta).format("%a, %d %b %Y %H:%M:%S GMT");
        let mut out = format!(
            "{}={}; Max-Age={}; Expires={}; Path={}",
            self.name,
            urlencoding::encode(&self.value),
            self.max_age.as_secs(),
            expires,
            self.path
        );
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }
}

/// Where the broker keeps its token between requests. Web integrations back this with the
/// request/response cookie headers; `MemoryCookieJar` serves tests and non-browser clients.
pub trait CookieJar: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, cookie: Cookie);
    fn remove(&self, name: &str);
}

#[derive(Default)]
pub struct MemoryCookieJar {
    cookies: RwLock<HashMap<String, (Cookie, Instant)>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self { Self::default() }

    /// `Set-Cookie` values for every live cookie, sorted by name.
    pub fn header_values(&self) -> Vec<String> {
        let now = Instant::now();
        let guard = self.cookies.read();
        let mut live: Vec<&Cookie> = guard.values().filter(|(_, exp)| *exp > now).map(|(c, _)| c).collect();
        live.sort_by(|a, b| a.name.cmp(&b.name));
        live.into_iter().map(Cookie::to_header_value).collect()
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        let now = Instant::now();
        let mut map = self.cookies.write();
        let expired = match map.get(name) {
            Some((c, exp)) if *exp > now => return Some(c.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            map.remove(name);
        }
        None
    }

    fn set(&self, cookie: Cookie) {
        let expires_at = Instant::now() + cookie.max_age;
        self.cookies.write().insert(cookie.name.clone(), (cookie, expires_at));
    }

    fn remove(&self, name: &str) {
        self.cookies.write().remove(name);
    }
}

#[cfg(test)]
#[path = "cookie_tests.rs"]
mod cookie_tests;
