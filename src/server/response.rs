//! Response channels and the formatter strategy that renders replies and failures.
//!
//! Redirect and JSONP consumers cannot read arbitrary response bodies, so failures on those
//! channels are embedded where the client can see them: a `sso_error` query parameter or the
//! script call's first argument.

use std::collections::HashMap;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde_json::{json, Value as JsonValue};

use crate::config::FormatterKind;
use crate::error::{AppError, AppResult};

/// 1x1 transparent GIF.
pub const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

static CALLBACK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][\w$.]*$").expect("static callback pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseChannel {
    Redirect(Url),
    Jsonp(String),
    Image,
    Json,
}

impl ResponseChannel {
    /// Pick the channel a request asked for: `return_url`, then `callback`, then `Accept`.
    /// `Ok(None)` when nothing usable was supplied.
    pub fn detect(params: &HashMap<String, String>, accept: Option<&str>) -> AppResult<Option<Self>> {
        if let Some(ret) = params.get("return_url").filter(|s| !s.is_empty()) {
            let url = Url::parse(ret)
                .ok()
                .filter(|u| u.scheme() == "http" || u.scheme() == "https")
                .ok_or_else(|| AppError::validation("invalid_return_url", "Invalid return url"))?;
            return Ok(Some(ResponseChannel::Redirect(url)));
        }
        if let Some(cb) = params.get("callback").filter(|s| !s.is_empty()) {
            if !CALLBACK_RE.is_match(cb) {
                return Err(AppError::validation("invalid_callback", "Invalid callback"));
            }
            return Ok(Some(ResponseChannel::Jsonp(cb.clone())));
        }
        let accept = accept.unwrap_or("");
        if accept.contains("image/") { return Ok(Some(ResponseChannel::Image)); }
        if accept.contains("application/json") { return Ok(Some(ResponseChannel::Json)); }
        Ok(None)
    }
}

/// Renders successful and failed outcomes. One strategy is chosen per server.
pub trait ResponseFormatter: Send + Sync {
    fn success(&self, channel: &ResponseChannel, status: StatusCode, body: Option<JsonValue>) -> Response;
    fn failure(&self, channel: &ResponseChannel, err: &AppError) -> Response;
}

pub fn formatter_for(kind: FormatterKind) -> std::sync::Arc<dyn ResponseFormatter> {
    match kind {
        FormatterKind::Channel => std::sync::Arc::new(ChannelFormatter),
        FormatterKind::Json => std::sync::Arc::new(JsonFormatter),
    }
}

fn status_of(err: &AppError) -> StatusCode {
    StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn json_reply(status: StatusCode, body: Option<JsonValue>) -> Response {
    match body {
        Some(v) => (status, Json(v)).into_response(),
        None => status.into_response(),
    }
}

fn json_error(err: &AppError) -> Response {
    (status_of(err), Json(json!({"error": err.message()}))).into_response()
}

/// 307 with only a `Location` header; the target never lands in a body.
fn redirect(url: &Url) -> Response {
    let mut resp = StatusCode::TEMPORARY_REDIRECT.into_response();
    if let Ok(v) = HeaderValue::from_str(url.as_str()) {
        resp.headers_mut().insert(header::LOCATION, v);
    }
    resp
}

fn jsonp(callback: &str, payload: &JsonValue, status: StatusCode) -> Response {
    let body = format!("{}({}, {});", callback, payload, status.as_u16());
    let mut resp = (StatusCode::OK, body).into_response();
    resp.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("application/javascript"));
    resp
}

/// Redirect, JSONP, pixel or JSON depending on the request.
pub struct ChannelFormatter;

impl ResponseFormatter for ChannelFormatter {
    fn success(&self, channel: &ResponseChannel, status: StatusCode, body: Option<JsonValue>) -> Response {
        match channel {
            ResponseChannel::Redirect(url) => redirect(url),
            ResponseChannel::Jsonp(cb) => jsonp(cb, &body.unwrap_or(JsonValue::Null), status),
            ResponseChannel::Image => {
                let mut resp = (StatusCode::OK, PIXEL_GIF).into_response();
                resp.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("image/gif"));
                resp
            }
            ResponseChannel::Json => json_reply(status, body),
        }
    }

    fn failure(&self, channel: &ResponseChannel, err: &AppError) -> Response {
        match channel {
            ResponseChannel::Redirect(url) => {
                let mut target = url.clone();
                target.query_pairs_mut().append_pair("sso_error", err.message());
                redirect(&target)
            }
            ResponseChannel::Jsonp(cb) => jsonp(cb, &json!({"error": err.message()}), status_of(err)),
            ResponseChannel::Image | ResponseChannel::Json => json_error(err),
        }
    }
}

/// Always JSON, whatever the request asked for.
pub struct JsonFormatter;

impl ResponseFormatter for JsonFormatter {
    fn success(&self, _channel: &ResponseChannel, status: StatusCode, body: Option<JsonValue>) -> Response {
        json_reply(status, body)
    }

    fn failure(&self, _channel: &ResponseChannel, err: &AppError) -> Response {
        json_error(err)
    }
}

/// Plain JSON error carrying the `AppError` in the response extensions, for hosts whose own
/// middleware renders failures.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut resp = json_error(&self);
        resp.extensions_mut().insert(self);
        resp
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod response_tests;
