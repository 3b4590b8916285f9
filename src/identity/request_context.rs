use std::collections::HashMap;
use uuid::Uuid;

use super::Session;
use crate::error::AppResult;

/// Everything a server handler needs from one inbound request, passed explicitly instead of
/// read from ambient globals.
pub struct RequestContext {
    pub request_id: Uuid,
    /// Query parameters merged with body parameters (body wins).
    pub params: HashMap<String, String>,
    pub accept: Option<String>,
    pub session: Session,
    /// Memoized outcome of broker-session resolution for this request.
    pub(crate) linked_broker: Option<AppResult<String>>,
}

impl RequestContext {
    pub fn new(params: HashMap<String, String>, accept: Option<String>, session: Session) -> Self {
        Self { request_id: Uuid::new_v4(), params, accept, session, linked_broker: None }
    }

    /// Non-empty parameter value.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str()).filter(|s| !s.is_empty())
    }

    /// Broker validated by the resolver for this request, if resolution already succeeded.
    pub fn broker(&self) -> Option<&str> {
        match &self.linked_broker {
            Some(Ok(b)) => Some(b.as_str()),
            _ => None,
        }
    }
}
