//! Attach handshake: bind a broker token to the user's server session.

use tracing::{debug, info};

use super::SsoServer;
use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;
use crate::linking::{checksums_match, derive, Purpose};

impl SsoServer {
    /// Verify the attach checksum and link the broker's session id to the current server
    /// session. The only side effect is one bridge write. Returns the linked session id.
    ///
    /// Response channel detection happens before this is called; see `ResponseChannel::detect`.
    pub fn attach(&self, ctx: &mut RequestContext) -> AppResult<String> {
        let Some(broker) = ctx.param("broker").map(str::to_string) else {
            return Err(AppError::validation("missing_broker", "No broker specified"));
        };
        let Some(token) = ctx.param("token").map(str::to_string) else {
            return Err(AppError::validation("missing_token", "No token specified"));
        };
        let given = ctx.param("checksum").unwrap_or("");

        // Unknown broker and wrong checksum are indistinguishable to the caller, in both the
        // error and the work done: an unknown broker is hashed against an empty secret.
        let invalid = || AppError::validation("invalid_checksum", "Invalid checksum");
        let secret = self.provider.broker_info(&broker).map(|b| b.secret);
        let expected = derive(Purpose::Attach, &broker, &token, secret.as_deref().unwrap_or(""));
        let matched = checksums_match(&expected, given);
        let Some(secret) = secret else {
            debug!(target: "sso.attach", request_id = %ctx.request_id, "attach for unknown broker");
            return Err(invalid());
        };
        if !matched {
            debug!(target: "sso.attach", request_id = %ctx.request_id, broker = %broker, "attach checksum mismatch");
            return Err(invalid());
        }

        let real_id = if self.config.attach_requires_login {
            match ctx.session.current_id() {
                Some(id) if ctx.session.user().is_some() => id.to_string(),
                _ => return Err(AppError::authorization("not_authenticated", "User is not logged in")),
            }
        } else {
            ctx.session.start()?
        };

        let linked = derive(Purpose::Session, &broker, &token, &secret);
        self.cache.set(&linked, &real_id, self.config.bridge_ttl);
        info!(target: "sso.attach", request_id = %ctx.request_id, broker = %broker, ttl_secs = self.config.bridge_ttl.as_secs(), "broker attached");
        Ok(linked)
    }
}
