//! Signed RPCs from the broker to the server's commands.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use super::{Broker, BrokerError, BrokerResult};

fn query_value(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

impl Broker {
    pub(crate) fn endpoint(&self, command: &str) -> BrokerResult<Url> {
        let base = self.config.server_url.trim_end_matches('/');
        Url::parse(&format!("{}/{}", base, command)).map_err(|e| BrokerError::InvalidUrl(format!("{}: {}", base, e)))
    }

    /// Call server command `command` as the attached client. `method` defaults to POST;
    /// GET and DELETE send `data` (a JSON object) as query parameters, other verbs as a JSON body.
    ///
    /// Fails with `NotAttached` without touching the network when there is no token, and clears
    /// the token when the server answers 403. No retries.
    pub async fn call(&mut self, command: &str, method: Option<Method>, data: &JsonValue) -> BrokerResult<JsonValue> {
        let Some(session_id) = self.session_id() else {
            return Err(BrokerError::NotAttached);
        };
        let method = method.unwrap_or(Method::POST);
        let in_query = method == Method::GET || method == Method::DELETE;

        let mut url = self.endpoint(command)?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("sso_session", &session_id);
            if in_query {
                if let JsonValue::Object(map) = data {
                    for (k, v) in map {
                        q.append_pair(k, &query_value(v));
                    }
                }
            }
        }

        let mut req = self.client.request(method.clone(), url).header(ACCEPT, "application/json");
        if !in_query && !data.is_null() {
            req = req.json(data);
        }
        debug!(target: "sso.broker", broker = %self.config.broker_id, command = command, method = %method, "calling SSO server");
        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(JsonValue::Null);
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = resp.text().await?;
        if !content_type.starts_with("application/json") {
            warn!(target: "sso.broker", command = command, status = status.as_u16(), content_type = %content_type, "unexpected content type");
            return Err(BrokerError::UnexpectedContentType { status: status.as_u16(), content_type, body });
        }

        if status == StatusCode::FORBIDDEN {
            info!(target: "sso.broker", broker = %self.config.broker_id, command = command, "server rejected session, clearing token");
            self.clear_token();
            return Err(BrokerError::NotAttached);
        }

        let value: JsonValue = serde_json::from_str(&body)?;
        if status.as_u16() >= 400 {
            let message = value
                .get("error")
                .and_then(|e| e.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            warn!(target: "sso.broker", command = command, status = status.as_u16(), "{}", message);
            return Err(BrokerError::Remote { status: status.as_u16(), message });
        }
        Ok(value)
    }

    /// Log the client in at the server through the linked session; caches the returned user.
    pub async fn login(&mut self, username: &str, password: &str) -> BrokerResult<JsonValue> {
        let user = self.call("login", None, &json!({"username": username, "password": password})).await?;
        self.user = Some(user.clone());
        Ok(user)
    }

    pub async fn logout(&mut self) -> BrokerResult<()> {
        self.call("logout", None, &JsonValue::Null).await?;
        self.user = None;
        Ok(())
    }

    /// The logged-in user's record, or `null`; fetched once per broker instance.
    pub async fn user_info(&mut self) -> BrokerResult<JsonValue> {
        if let Some(user) = &self.user {
            return Ok(user.clone());
        }
        let user = self.call("userInfo", Some(Method::GET), &JsonValue::Null).await?;
        self.user = Some(user.clone());
        Ok(user)
    }
}
