//!
//! SSO server
//! ----------
//! Axum HTTP surface and the request-independent core shared by all handlers.
//!
//! Responsibilities:
//! - `attach`: verify a broker's attach checksum and write the bridge entry.
//! - `userInfo`, `login`, `logout`: broker commands resolved through the bridge.
//! - Extension commands registered by the host application.
//! - Server-session cookie handling; one unified failure path per response channel.
//! - Background sweep of expired bridge entries and sessions, optional cache snapshots.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{MemorySessionStore, RequestContext, Session, SessionStore, SsoProvider};
use crate::storage::{BridgeCache, MemoryBridgeCache};

pub mod attach;
pub mod commands;
pub mod resolver;
pub mod response;

pub use commands::{CommandContext, CommandHandler};
pub use response::{ChannelFormatter, JsonFormatter, ResponseChannel, ResponseFormatter};

/// Request-independent server state. Handlers receive it as `Arc<SsoServer>`; hosts embedding
/// the core directly call `attach`, `resolve_broker`, `login`, `logout`, `user_info` and
/// `dispatch`, which always return `AppResult` and never render.
pub struct SsoServer {
    pub(crate) config: ServerConfig,
    pub(crate) provider: Arc<dyn SsoProvider>,
    pub(crate) cache: Arc<dyn BridgeCache>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    formatter: Arc<dyn ResponseFormatter>,
    commands: HashMap<String, Arc<dyn CommandHandler>>,
}

impl SsoServer {
    pub fn new(
        config: ServerConfig,
        provider: Arc<dyn SsoProvider>,
        cache: Arc<dyn BridgeCache>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let formatter = response::formatter_for(config.formatter);
        Self { config, provider, cache, sessions, formatter, commands: HashMap::new() }
    }

    /// Register an extension command, served at `/{name}`.
    pub fn with_command(mut self, name: &str, handler: Arc<dyn CommandHandler>) -> Self {
        self.commands.insert(name.to_string(), handler);
        self
    }

    pub fn config(&self) -> &ServerConfig { &self.config }

    /// Build the per-request context from query parameters, headers and an optional JSON body.
    pub fn request_context(&self, mut params: HashMap<String, String>, headers: &HeaderMap, body: &[u8]) -> AppResult<RequestContext> {
        if !body.is_empty() && is_json(headers) {
            let map: serde_json::Map<String, JsonValue> = serde_json::from_slice(body)
                .map_err(|e| AppError::validation("invalid_body".to_string(), format!("Invalid JSON body: {}", e)))?;
            for (k, v) in map {
                let s = match v {
                    JsonValue::String(s) => s,
                    JsonValue::Null => String::new(),
                    other => other.to_string(),
                };
                params.insert(k, s);
            }
        }
        let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
        let cookie = parse_cookie(headers, &self.config.session_cookie);
        let session = Session::from_cookie(self.sessions.clone(), cookie);
        Ok(RequestContext::new(params, accept, session))
    }

    /// The single failure path: log, then render through the formatter or hand the error to
    /// host middleware.
    pub fn fail(&self, channel: &ResponseChannel, err: AppError) -> Response {
        if err.is_fatal() {
            error!(target: "sso", code = err.code_str(), "protocol violation: {}", err.message());
        } else if err.http_status() >= 500 {
            warn!(target: "sso", code = err.code_str(), "{}", err.message());
        } else {
            debug!(target: "sso", code = err.code_str(), status = err.http_status(), "{}", err.message());
        }
        if self.config.propagate_errors {
            return err.into_response();
        }
        self.formatter.failure(channel, &err)
    }

    fn respond(&self, ctx: &RequestContext, channel: &ResponseChannel, status: StatusCode, out: AppResult<Option<JsonValue>>) -> Response {
        let mut resp = match out {
            Ok(body) => self.formatter.success(channel, status, body),
            Err(e) => self.fail(channel, e),
        };
        if ctx.session.was_started() {
            if let Some(sid) = ctx.session.current_id() {
                if let Some(v) = self.session_cookie(sid) {
                    resp.headers_mut().append(header::SET_COOKIE, v);
                }
            }
        }
        resp
    }

    fn session_cookie(&self, sid: &str) -> Option<HeaderValue> {
        // Cross-site pixel/JSONP attaches need SameSite=None, which browsers only honor with Secure
        let same_site = if self.config.cookie_secure { "SameSite=None; Secure" } else { "SameSite=Lax" };
        HeaderValue::from_str(&format!(
            "{}={}; HttpOnly; {}; Path=/; Max-Age={}",
            self.config.session_cookie, sid, same_site, self.config.session_ttl.as_secs()
        )).ok()
    }

    /// Every command accepts any verb; brokers default to POST and may override per call.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", any(|| async { "sso ok" }))
            .route("/attach", any(attach_handler))
            .route("/login", any(login_handler))
            .route("/logout", any(logout_handler))
            .route("/userInfo", any(user_info_handler))
            .route("/{command}", any(command_handler))
            .fallback(unknown_path_handler)
            .with_state(self)
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.starts_with("application/json"))
        .unwrap_or(false)
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(header::COOKIE).iter() {
        let Ok(s) = cookie.to_str() else { continue; };
        for part in s.split(';') {
            let p = part.trim();
            if let Some((k, v)) = p.split_once('=') {
                if k == name && !v.is_empty() { return Some(v.to_string()); }
            }
        }
    }
    None
}

async fn attach_handler(
    State(server): State<Arc<SsoServer>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut ctx = match server.request_context(query, &headers, &body) {
        Ok(c) => c,
        Err(e) => return server.fail(&ResponseChannel::Json, e),
    };
    let channel = match ResponseChannel::detect(&ctx.params, ctx.accept.as_deref()) {
        Ok(Some(c)) => c,
        Ok(None) => return server.fail(&ResponseChannel::Json, AppError::validation("missing_return_channel", "No return url specified")),
        Err(e) => return server.fail(&ResponseChannel::Json, e),
    };
    let out = server.attach(&mut ctx).map(|_| Some(json!({"success": "attached"})));
    server.respond(&ctx, &channel, StatusCode::OK, out)
}

async fn login_handler(
    State(server): State<Arc<SsoServer>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut ctx = match server.request_context(query, &headers, &body) {
        Ok(c) => c,
        Err(e) => return server.fail(&ResponseChannel::Json, e),
    };
    let out = server.login(&mut ctx).map(Some);
    server.respond(&ctx, &ResponseChannel::Json, StatusCode::OK, out)
}

async fn logout_handler(
    State(server): State<Arc<SsoServer>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut ctx = match server.request_context(query, &headers, &body) {
        Ok(c) => c,
        Err(e) => return server.fail(&ResponseChannel::Json, e),
    };
    let out = server.logout(&mut ctx).map(|_| None);
    server.respond(&ctx, &ResponseChannel::Json, StatusCode::NO_CONTENT, out)
}

async fn user_info_handler(
    State(server): State<Arc<SsoServer>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut ctx = match server.request_context(query, &headers, &body) {
        Ok(c) => c,
        Err(e) => return server.fail(&ResponseChannel::Json, e),
    };
    let out = server.user_info(&mut ctx).map(Some);
    server.respond(&ctx, &ResponseChannel::Json, StatusCode::OK, out)
}

async fn command_handler(
    State(server): State<Arc<SsoServer>>,
    Path(command): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut ctx = match server.request_context(query, &headers, &body) {
        Ok(c) => c,
        Err(e) => return server.fail(&ResponseChannel::Json, e),
    };
    let out = server.dispatch(&command, &mut ctx).map(Some);
    server.respond(&ctx, &ResponseChannel::Json, StatusCode::OK, out)
}

async fn unknown_path_handler(State(server): State<Arc<SsoServer>>) -> Response {
    server.fail(&ResponseChannel::Json, AppError::not_found("unknown_command", "Unknown command"))
}

/// Start the SSO server with in-memory bridge cache and session store.
///
/// Loads a bridge snapshot when configured, sweeps expired entries in the background and
/// writes a final snapshot on Ctrl-C.
pub async fn run(config: ServerConfig, provider: Arc<dyn SsoProvider>) -> anyhow::Result<()> {
    let cache = Arc::new(MemoryBridgeCache::new());
    if let Some(path) = &config.snapshot_path {
        match cache.load_snapshot(path) {
            Ok(n) => info!(target: "startup", restored = n, "bridge snapshot loaded from {}", path.display()),
            Err(e) => warn!(target: "startup", "Failed to load bridge snapshot {}: {}", path.display(), e),
        }
    }
    let sessions = Arc::new(MemorySessionStore::new(config.session_ttl));

    // Start background sweeper
    {
        let cache = cache.clone();
        let sessions = sessions.clone();
        let interval = config.sweep_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let bridges = cache.sweep();
                let expired = sessions.sweep();
                if bridges > 0 || expired > 0 { debug!(bridges = bridges, sessions = expired, "sso_sweep"); }
            }
        });
    }

    let server = Arc::new(SsoServer::new(config.clone(), provider, cache.clone(), sessions));
    let app = server.router();

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting SSO server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    if let Some(path) = &config.snapshot_path {
        let n = cache.save_snapshot(path)?;
        info!(saved = n, "bridge snapshot written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
