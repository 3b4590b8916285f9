//! Broker-facing commands: login, logout, userInfo and application extension commands.

use std::collections::HashMap;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use super::SsoServer;
use crate::error::{AppError, AppResult};
use crate::identity::{RequestContext, Session, USER_KEY};

/// What an extension command sees of the request after the broker session was resolved.
pub struct CommandContext<'a> {
    pub broker_id: &'a str,
    pub params: &'a HashMap<String, String>,
    pub session: &'a mut Session,
}

/// Application extension point for commands the core does not implement.
pub trait CommandHandler: Send + Sync {
    fn handle(&self, ctx: CommandContext<'_>) -> AppResult<JsonValue>;
}

impl SsoServer {
    /// Use the broker-linked session when the request names one, otherwise the caller's own
    /// server session (a user logging in at the server directly).
    fn select_session(&self, ctx: &mut RequestContext) -> AppResult<()> {
        if ctx.param("sso_session").is_some() {
            self.resolve_broker(ctx)?;
        }
        Ok(())
    }

    pub fn login(&self, ctx: &mut RequestContext) -> AppResult<JsonValue> {
        let Some(username) = ctx.param("username").map(str::to_string) else {
            return Err(AppError::validation("missing_username", "No username specified"));
        };
        let Some(password) = ctx.param("password").map(str::to_string) else {
            return Err(AppError::validation("missing_password", "No password specified"));
        };
        self.select_session(ctx)?;

        self.provider
            .authenticate(&username, &password, &ctx.params)
            .map_err(|e| AppError::validation("authentication_failed".to_string(), e.0))?;

        ctx.session.set(USER_KEY, json!(username))?;
        info!(target: "sso.login", request_id = %ctx.request_id, broker = ?ctx.broker(), "user logged in");
        self.session_user_info(ctx)
    }

    pub fn logout(&self, ctx: &mut RequestContext) -> AppResult<()> {
        self.select_session(ctx)?;
        if ctx.session.is_active() {
            ctx.session.set(USER_KEY, JsonValue::Null)?;
            info!(target: "sso.login", request_id = %ctx.request_id, broker = ?ctx.broker(), "user logged out");
        }
        Ok(())
    }

    /// User record for the broker-linked session, or `null` when nobody is logged in.
    pub fn user_info(&self, ctx: &mut RequestContext) -> AppResult<JsonValue> {
        self.resolve_broker(ctx)?;
        self.session_user_info(ctx)
    }

    fn session_user_info(&self, ctx: &RequestContext) -> AppResult<JsonValue> {
        let Some(username) = ctx.session.user() else { return Ok(JsonValue::Null); };
        self.provider
            .user_info(&username)
            .ok_or_else(|| AppError::internal("user_not_found", "User not found"))
    }

    /// Run a registered extension command on behalf of the resolved broker.
    pub fn dispatch(&self, command: &str, ctx: &mut RequestContext) -> AppResult<JsonValue> {
        let Some(handler) = self.commands.get(command).cloned() else {
            return Err(AppError::not_found("unknown_command", "Unknown command"));
        };
        let broker_id = self.resolve_broker(ctx)?;
        handler.handle(CommandContext {
            broker_id: &broker_id,
            params: &ctx.params,
            session: &mut ctx.session,
        })
    }
}
