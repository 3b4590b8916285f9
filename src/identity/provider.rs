use anyhow::{anyhow, Context, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::Path;

/// Registered broker. Only `secret` is interpreted; anything else is carried for the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrokerInfo {
    pub secret: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

/// Credential rejection; the message is returned to the broker verbatim.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{0}")]
pub struct AuthRejected(pub String);

/// Capabilities the embedding application supplies to the server core.
pub trait SsoProvider: Send + Sync {
    fn authenticate(&self, username: &str, password: &str, params: &HashMap<String, String>) -> Result<(), AuthRejected>;
    fn broker_info(&self, broker_id: &str) -> Option<BrokerInfo>;
    fn user_info(&self, username: &str) -> Option<JsonValue>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticUser {
    /// Argon2 PHC string.
    pub password_hash: String,
    #[serde(default)]
    pub info: JsonValue,
}

/// File-backed provider: brokers and users declared up front in JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticProvider {
    #[serde(default)]
    pub brokers: HashMap<String, BrokerInfo>,
    #[serde(default)]
    pub users: HashMap<String, StaticUser>,
}

impl StaticProvider {
    pub fn new() -> Self { Self::default() }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading providers file {}", path.display()))?;
        let p: StaticProvider = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing providers file {}", path.display()))?;
        tracing::info!(target: "startup", brokers = p.brokers.len(), users = p.users.len(), "loaded providers file");
        Ok(p)
    }

    pub fn with_broker(mut self, broker_id: &str, secret: &str) -> Self {
        self.brokers.insert(broker_id.to_string(), BrokerInfo { secret: secret.to_string(), extra: Default::default() });
        self
    }

    pub fn with_user(mut self, username: &str, password: &str, info: JsonValue) -> Result<Self> {
        let password_hash = hash_password(password)?;
        self.users.insert(username.to_string(), StaticUser { password_hash, info });
        Ok(self)
    }
}

impl SsoProvider for StaticProvider {
    fn authenticate(&self, username: &str, password: &str, _params: &HashMap<String, String>) -> Result<(), AuthRejected> {
        let Some(user) = self.users.get(username) else {
            return Err(AuthRejected("Incorrect username or password".into()));
        };
        if !verify_password(&user.password_hash, password) {
            return Err(AuthRejected("Incorrect username or password".into()));
        }
        Ok(())
    }

    fn broker_info(&self, broker_id: &str) -> Option<BrokerInfo> {
        self.brokers.get(broker_id).cloned()
    }

    fn user_info(&self, username: &str) -> Option<JsonValue> {
        let user = self.users.get(username)?;
        let mut info = match &user.info {
            JsonValue::Object(m) => m.clone(),
            _ => serde_json::Map::new(),
        };
        info.entry("username").or_insert_with(|| JsonValue::String(username.to_string()));
        Some(JsonValue::Object(info))
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod provider_tests;
