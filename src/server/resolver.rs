//! Per-request resolution of a broker's `sso_session` back to the real server session.

use tracing::{debug, error};

use super::SsoServer;
use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;
use crate::linking::{checksums_match, derive_for, LinkedId, Purpose};

impl SsoServer {
    /// Resolve the broker session for this request and resume the linked server session.
    /// Returns the validated broker id. The outcome, success or failure, is memoized on the
    /// context so repeated calls within one request do no further work.
    pub fn resolve_broker(&self, ctx: &mut RequestContext) -> AppResult<String> {
        if let Some(done) = &ctx.linked_broker {
            return done.clone();
        }
        let out = self.resolve_uncached(ctx);
        ctx.linked_broker = Some(out.clone());
        out
    }

    fn resolve_uncached(&self, ctx: &mut RequestContext) -> AppResult<String> {
        let Some(sid) = ctx.param("sso_session").map(str::to_string) else {
            return Err(AppError::validation("missing_session", "Broker didn't send a session key"));
        };

        let Some(linked) = self.cache.get(&sid) else {
            debug!(target: "sso.resolve", request_id = %ctx.request_id, "no bridge entry");
            return Err(AppError::authorization("not_attached", "Broker session not attached"));
        };

        match ctx.session.current_id() {
            Some(current) if current != linked => {
                error!(target: "sso.resolve", request_id = %ctx.request_id, "live session differs from linked session");
                return Err(AppError::protocol("session_conflict", "Session has already started"));
            }
            Some(_) => {}
            None => ctx.session.resume(&linked),
        }

        let Some(parsed) = LinkedId::parse(&sid) else {
            return Err(AppError::validation("invalid_session_id", "Invalid session id"));
        };

        let expected = derive_for(self.provider.as_ref(), Purpose::Session, &parsed.broker_id, &parsed.token).ok();
        if !expected.map(|e| checksums_match(&e, &sid)).unwrap_or(false) {
            debug!(target: "sso.resolve", request_id = %ctx.request_id, broker = %parsed.broker_id, "session checksum mismatch");
            return Err(AppError::authorization("checksum_failed", "Checksum failed"));
        }

        Ok(parsed.broker_id)
    }
}
