//! Client token lifecycle and attach URL construction.

use reqwest::Url;
use tracing::debug;

use super::{Broker, BrokerResult, Cookie};
use crate::linking::{derive, Purpose};

/// 160 random bits, hex encoded so the token stays inside the `\w` session id grammar.
fn gen_token() -> BrokerResult<String> {
    let mut buf = [0u8; 20];
    getrandom::getrandom(&mut buf)?;
    Ok(hex::encode(buf))
}

impl Broker {
    /// Return the client token, generating and persisting one on first use.
    pub fn ensure_token(&mut self) -> BrokerResult<String> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }
        let token = gen_token()?;
        self.cookies.set(Cookie::new(&self.cookie_name, &token, self.config.cookie_ttl));
        debug!(target: "sso.broker", broker = %self.config.broker_id, "issued client token");
        self.token = Some(token.clone());
        Ok(token)
    }

    /// Expire the token cookie and forget the token and any cached user.
    pub fn clear_token(&mut self) {
        self.cookies.remove(&self.cookie_name);
        self.token = None;
        self.user = None;
    }

    pub fn is_attached(&self) -> bool { self.token.is_some() }

    pub fn token(&self) -> Option<&str> { self.token.as_deref() }

    /// Session-purpose id sent as `sso_session` on every RPC.
    pub fn session_id(&self) -> Option<String> {
        self.token
            .as_deref()
            .map(|t| derive(Purpose::Session, &self.config.broker_id, t, &self.config.secret))
    }

    /// `{server}/attach?broker=..&token=..&checksum=..` plus `extra` (e.g. `return_url`).
    pub fn attach_url(&mut self, extra: &[(&str, &str)]) -> BrokerResult<Url> {
        let token = self.ensure_token()?;
        let checksum = derive(Purpose::Attach, &self.config.broker_id, &token, &self.config.secret);
        let mut url = self.endpoint("attach")?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("broker", &self.config.broker_id);
            q.append_pair("token", &token);
            q.append_pair("checksum", &checksum);
            for (k, v) in extra {
                q.append_pair(k, v);
            }
        }
        Ok(url)
    }
}
