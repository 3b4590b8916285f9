use super::*;
use std::collections::HashMap;

use reqwest::Method;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::linking::{derive, Purpose};

const BROKER: &str = "shop1";
const SECRET: &str = "s3cr3t";

fn broker_for(server_url: &str, jar: Arc<MemoryCookieJar>) -> Broker {
    Broker::new(BrokerConfig::new(server_url, BROKER, SECRET), jar).unwrap()
}

fn attached(server_url: &str) -> (Broker, Arc<MemoryCookieJar>) {
    let jar = Arc::new(MemoryCookieJar::new());
    let mut b = broker_for(server_url, jar.clone());
    b.ensure_token().unwrap();
    (b, jar)
}

#[test]
fn token_is_created_once_and_persisted() {
    let jar = Arc::new(MemoryCookieJar::new());
    let mut b = broker_for("http://sso.local", jar.clone());
    assert!(!b.is_attached());
    let t1 = b.ensure_token().unwrap();
    let t2 = b.ensure_token().unwrap();
    assert_eq!(t1, t2);
    assert_eq!(t1.len(), 40);
    assert!(t1.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(jar.get("sso_token_shop1"), Some(t1.clone()));

    // a new instance for the same client picks the token up from the cookie
    let again = broker_for("http://sso.local", jar.clone());
    assert_eq!(again.token(), Some(t1.as_str()));
}

#[test]
fn clear_token_forgets_old_session_id() {
    let jar = Arc::new(MemoryCookieJar::new());
    let mut b = broker_for("http://sso.local", jar.clone());
    b.ensure_token().unwrap();
    let old = b.session_id().unwrap();
    b.clear_token();
    assert!(!b.is_attached());
    assert!(b.session_id().is_none());
    assert!(jar.get("sso_token_shop1").is_none());
    b.ensure_token().unwrap();
    assert_ne!(b.session_id().unwrap(), old);
}

#[test]
fn attach_url_carries_attach_checksum() {
    let (mut b, _) = attached("http://sso.local/");
    let url = b.attach_url(&[("return_url", "https://shop1.example/back")]).unwrap();
    let token = b.token().unwrap().to_string();
    assert_eq!(url.path(), "/attach");
    let q: HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(q["broker"], BROKER);
    assert_eq!(q["token"], token);
    assert_eq!(q["checksum"], derive(Purpose::Attach, BROKER, &token, SECRET));
    assert_eq!(q["return_url"], "https://shop1.example/back");
}

#[test]
fn invalid_server_url_is_reported() {
    let (mut b, _) = attached("not a url");
    assert!(matches!(b.attach_url(&[]), Err(BrokerError::InvalidUrl(_))));
}

#[tokio::test]
async fn call_without_token_makes_no_request() {
    let server = MockServer::start().await;
    let mut b = broker_for(&server.uri(), Arc::new(MemoryCookieJar::new()));
    let err = b.call("userInfo", Some(Method::GET), &JsonValue::Null).await.unwrap_err();
    assert!(matches!(err, BrokerError::NotAttached));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn get_sends_session_and_data_as_query() {
    let server = MockServer::start().await;
    let (mut b, _) = attached(&server.uri());
    let sid = b.session_id().unwrap();
    Mock::given(method("GET"))
        .and(path("/userInfo"))
        .and(query_param("sso_session", sid.as_str()))
        .and(query_param("fields", "name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "jackie"})))
        .expect(1)
        .mount(&server)
        .await;
    let v = b.call("userInfo", Some(Method::GET), &json!({"fields": "name"})).await.unwrap();
    assert_eq!(v["username"], "jackie");
}

#[tokio::test]
async fn post_is_default_and_sends_json_body() {
    let server = MockServer::start().await;
    let (mut b, _) = attached(&server.uri());
    Mock::given(method("POST"))
        .and(path("/grantAccess"))
        .and(body_json(json!({"role": "admin"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;
    let v = b.call("grantAccess", None, &json!({"role": "admin"})).await.unwrap();
    assert_eq!(v, json!({"ok": true}));
}

#[tokio::test]
async fn no_content_is_null() {
    let server = MockServer::start().await;
    let (mut b, _) = attached(&server.uri());
    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    b.logout().await.unwrap();
}

#[tokio::test]
async fn non_json_response_is_rejected() {
    let server = MockServer::start().await;
    let (mut b, _) = attached(&server.uri());
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>hi</html>", "text/html"))
        .mount(&server)
        .await;
    let err = b.call("userInfo", Some(Method::GET), &JsonValue::Null).await.unwrap_err();
    match err {
        BrokerError::UnexpectedContentType { status, content_type, body } => {
            assert_eq!(status, 200);
            assert!(content_type.starts_with("text/html"));
            assert_eq!(body, "<html>hi</html>");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(b.is_attached());
}

#[tokio::test]
async fn forbidden_clears_token() {
    let server = MockServer::start().await;
    let (mut b, jar) = attached(&server.uri());
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "Broker session not attached"})))
        .mount(&server)
        .await;
    let err = b.user_info().await.unwrap_err();
    assert!(matches!(err, BrokerError::NotAttached));
    assert!(!b.is_attached());
    assert!(jar.get(b.cookie_name()).is_none());
}

#[tokio::test]
async fn server_error_carries_message() {
    let server = MockServer::start().await;
    let (mut b, _) = attached(&server.uri());
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Incorrect username or password"})))
        .mount(&server)
        .await;
    let err = b.login("jackie", "nope").await.unwrap_err();
    match err {
        BrokerError::Remote { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Incorrect username or password");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(b.is_attached());
}

#[tokio::test]
async fn user_info_is_cached_until_logout() {
    let server = MockServer::start().await;
    let (mut b, _) = attached(&server.uri());
    Mock::given(method("GET"))
        .and(path("/userInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "jackie"})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    assert_eq!(b.user_info().await.unwrap()["username"], "jackie");
    assert_eq!(b.user_info().await.unwrap()["username"], "jackie");
    b.logout().await.unwrap();
    b.user_info().await.unwrap();
}

#[tokio::test]
async fn login_caches_returned_user() {
    let server = MockServer::start().await;
    let (mut b, _) = attached(&server.uri());
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"username": "jackie", "password": "jackie123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "jackie"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    b.login("jackie", "jackie123").await.unwrap();
    assert_eq!(b.user_info().await.unwrap()["username"], "jackie");
}
