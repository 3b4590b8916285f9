//! Server and broker configuration.
//!
//! Defaults are overridden by `SSO_*` environment variables; the server binary additionally
//! lets CLI flags override the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Response rendering strategy, fixed when the server is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatterKind {
    /// Redirect / JSONP / pixel / JSON depending on the request.
    #[default]
    Channel,
    /// Always JSON, for API-only deployments.
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_port: u16,
    /// Lifetime of a bridge entry written by attach.
    pub bridge_ttl: Duration,
    pub session_ttl: Duration,
    pub session_cookie: String,
    pub cookie_secure: bool,
    /// When false, attach starts a fresh server session instead of requiring a logged-in one.
    pub attach_requires_login: bool,
    pub formatter: FormatterKind,
    /// Hand failures to host middleware instead of rendering them per channel.
    pub propagate_errors: bool,
    pub snapshot_path: Option<PathBuf>,
    pub sweep_interval: Duration,
    pub providers_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 7878,
            bridge_ttl: Duration::from_secs(10 * 3600),
            session_ttl: Duration::from_secs(24 * 3600),
            session_cookie: "sso_server_session".to_string(),
            cookie_secure: false,
            attach_requires_login: true,
            formatter: FormatterKind::Channel,
            propagate_errors: false,
            snapshot_path: None,
            sweep_interval: Duration::from_secs(5),
            providers_file: None,
        }
    }
}

pub(crate) fn parse_u64_env(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.trim().parse::<u64>().ok())
}

pub(crate) fn parse_bool_env(name: &str) -> Option<bool> {
    match env::var(name) {
        Ok(v) => parse_bool(&v),
        Err(_) => None,
    }
}

pub fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(p) = parse_u64_env("SSO_HTTP_PORT").and_then(|p| u16::try_from(p).ok()) { cfg.http_port = p; }
        if let Some(s) = parse_u64_env("SSO_BRIDGE_TTL_SECS") { cfg.bridge_ttl = Duration::from_secs(s); }
        if let Some(s) = parse_u64_env("SSO_SESSION_TTL_SECS") { cfg.session_ttl = Duration::from_secs(s); }
        if let Ok(name) = env::var("SSO_SESSION_COOKIE") {
            if !name.trim().is_empty() { cfg.session_cookie = name.trim().to_string(); }
        }
        if let Some(b) = parse_bool_env("SSO_COOKIE_SECURE") { cfg.cookie_secure = b; }
        if let Some(b) = parse_bool_env("SSO_ATTACH_REQUIRES_LOGIN") { cfg.attach_requires_login = b; }
        if let Ok(f) = env::var("SSO_FORMATTER") {
            match f.trim().to_lowercase().as_str() {
                "json" => cfg.formatter = FormatterKind::Json,
                "channel" => cfg.formatter = FormatterKind::Channel,
                other => tracing::warn!(target: "startup", "ignoring unknown SSO_FORMATTER={}", other),
            }
        }
        if let Some(b) = parse_bool_env("SSO_PROPAGATE_ERRORS") { cfg.propagate_errors = b; }
        cfg.snapshot_path = env::var("SSO_SNAPSHOT").ok().map(PathBuf::from);
        cfg.providers_file = env::var("SSO_PROVIDERS_FILE").ok().map(PathBuf::from);
        cfg
    }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub server_url: String,
    pub broker_id: String,
    pub secret: String,
    /// Lifetime of the broker token cookie.
    pub cookie_ttl: Duration,
    /// Per-call timeout for server RPCs; none means the client default.
    pub timeout: Option<Duration>,
}

impl BrokerConfig {
    pub fn new(server_url: &str, broker_id: &str, secret: &str) -> Self {
        Self {
            server_url: server_url.to_string(),
            broker_id: broker_id.to_string(),
            secret: secret.to_string(),
            cookie_ttl: Duration::from_secs(7200),
            timeout: None,
        }
    }

    /// Read `SSO_SERVER`, `SSO_BROKER_ID`, `SSO_BROKER_SECRET` (required) plus optional
    /// `SSO_COOKIE_TTL_SECS` and `SSO_TIMEOUT_MS`.
    pub fn from_env() -> anyhow::Result<Self> {
        let need = |name: &str| env::var(name).map_err(|_| anyhow::anyhow!("{} not set", name));
        let mut cfg = Self::new(&need("SSO_SERVER")?, &need("SSO_BROKER_ID")?, &need("SSO_BROKER_SECRET")?);
        if let Some(s) = parse_u64_env("SSO_COOKIE_TTL_SECS") { cfg.cookie_ttl = Duration::from_secs(s); }
        cfg.timeout = parse_u64_env("SSO_TIMEOUT_MS").map(Duration::from_millis);
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let c = ServerConfig::default();
        assert_eq!(c.bridge_ttl, Duration::from_secs(36_000));
        assert!(c.attach_requires_login);
        assert_eq!(c.formatter, FormatterKind::Channel);
        assert!(!c.propagate_errors);
    }

    #[test]
    fn broker_defaults() {
        let c = BrokerConfig::new("http://sso.local", "shop1", "s3cr3t");
        assert_eq!(c.cookie_ttl, Duration::from_secs(7200));
        assert!(c.timeout.is_none());
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn server_config_deserializes_partial_json() {
        let c: ServerConfig = serde_json::from_str(r#"{"http_port": 9000, "formatter": "json"}"#).unwrap();
        assert_eq!(c.http_port, 9000);
        assert_eq!(c.formatter, FormatterKind::Json);
        assert_eq!(c.session_cookie, "sso_server_session");
    }
}
