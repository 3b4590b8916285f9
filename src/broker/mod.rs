//!
//! SSO broker
//! ----------
//! Client side of the session-linking protocol, embedded in each application that trusts the
//! central server. The broker never sees user credentials it does not forward; it owns an opaque
//! client token (kept in a broker-scoped cookie), builds attach URLs and issues signed RPCs
//! against the server's commands.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::config::BrokerConfig;

pub mod cookie;
mod dispatch;
mod token;

pub use cookie::{cookie_name, Cookie, CookieJar, MemoryCookieJar};

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// No client token, or the server no longer recognizes it.
    #[error("broker is not attached to the SSO server")]
    NotAttached,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("expected application/json from SSO server, got '{content_type}' (HTTP {status})")]
    UnexpectedContentType { status: u16, content_type: String, body: String },
    #[error("SSO server error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },
    #[error("invalid SSO server url: {0}")]
    InvalidUrl(String),
    #[error("invalid JSON from SSO server: {0}")]
    Json(#[from] serde_json::Error),
    #[error("random source unavailable: {0}")]
    Entropy(#[from] getrandom::Error),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// One broker instance per client (browser) interaction. The token is read from the cookie jar
/// on construction, so a fresh `Broker` for a returning client is already attached.
pub struct Broker {
    config: BrokerConfig,
    cookie_name: String,
    cookies: Arc<dyn CookieJar>,
    token: Option<String>,
    user: Option<JsonValue>,
    client: reqwest::Client,
}

impl Broker {
    pub fn new(config: BrokerConfig, cookies: Arc<dyn CookieJar>) -> BrokerResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = config.timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build()?;
        let cookie_name = cookie_name(&config.broker_id);
        let token = cookies.get(&cookie_name);
        Ok(Self { config, cookie_name, cookies, token, user: None, client })
    }

    pub fn config(&self) -> &BrokerConfig { &self.config }

    pub fn cookie_name(&self) -> &str { &self.cookie_name }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod broker_tests;
