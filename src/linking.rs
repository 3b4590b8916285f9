//! Session-linking ids.
//!
//! Both sides derive the same ids from `(purpose, broker, token, secret)`; the secret itself never
//! travels. An attach checksum is the bare hex digest, a session id is the composite
//! `SSO-{broker}-{token}-{digest}`, so one can never be presented in place of the other.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::identity::SsoProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// One-time proof authorizing the bridge write.
    Attach,
    /// Carried on every broker request after attach.
    Session,
}

impl Purpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::Attach => "attach",
            Purpose::Session => "session",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeriveError {
    #[error("unknown broker: {0}")]
    UnknownBroker(String),
}

static SESSION_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^SSO-(\w+)-(\w+)-([a-z0-9]+)$").expect("static session id pattern")
});

/// Lowercase hex SHA-256 over `purpose || token || secret`.
pub fn checksum(purpose: Purpose, token: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(purpose.as_str().as_bytes());
    hasher.update(token.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pure derivation with a known secret.
pub fn derive(purpose: Purpose, broker_id: &str, token: &str, secret: &str) -> String {
    let sum = checksum(purpose, token, secret);
    match purpose {
        Purpose::Attach => sum,
        Purpose::Session => format!("SSO-{}-{}-{}", broker_id, token, sum),
    }
}

/// Derivation resolving the broker secret through the provider.
pub fn derive_for(provider: &dyn SsoProvider, purpose: Purpose, broker_id: &str, token: &str) -> Result<String, DeriveError> {
    let Some(info) = provider.broker_info(broker_id) else {
        return Err(DeriveError::UnknownBroker(broker_id.to_string()));
    };
    Ok(derive(purpose, broker_id, token, &info.secret))
}

/// Constant-time string comparison for checksums.
pub fn checksums_match(expected: &str, given: &str) -> bool {
    expected.as_bytes().ct_eq(given.as_bytes()).into()
}

/// Components of a session-purpose id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedId {
    pub broker_id: String,
    pub token: String,
    pub checksum: String,
}

impl LinkedId {
    /// Parse `SSO-{broker}-{token}-{checksum}`; `None` when the grammar does not match.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = SESSION_ID_RE.captures(raw)?;
        Some(Self {
            broker_id: caps[1].to_string(),
            token: caps[2].to_string(),
            checksum: caps[3].to_string(),
        })
    }
}

#[cfg(test)]
#[path = "linking_tests.rs"]
mod linking_tests;
