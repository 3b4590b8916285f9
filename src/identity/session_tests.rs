use super::*;
use serde_json::json;

fn store() -> Arc<MemorySessionStore> { Arc::new(MemorySessionStore::default()) }

#[test]
fn create_then_get_set_roundtrip() {
    let s = store();
    let id = s.create().unwrap();
    assert!(s.exists(&id));
    s.set(&id, "k", json!("v"));
    assert_eq!(s.get(&id, "k"), Some(json!("v")));
    s.set(&id, "k", JsonValue::Null);
    assert_eq!(s.get(&id, "k"), None);
}

#[test]
fn ids_are_unique_and_url_safe() {
    let s = store();
    let a = s.create().unwrap();
    let b = s.create().unwrap();
    assert_ne!(a, b);
    assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
}

#[test]
fn expired_sessions_disappear() {
    let s = Arc::new(MemorySessionStore::new(Duration::from_millis(20)));
    let id = s.create().unwrap();
    std::thread::sleep(Duration::from_millis(40));
    assert!(!s.exists(&id));
    let other = s.create().unwrap();
    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(s.sweep(), 1);
    assert!(!s.exists(&other));
}

#[test]
fn cookie_naming_dead_session_is_inactive() {
    let s = store();
    let sess = Session::from_cookie(s.clone(), Some("nope".into()));
    assert!(!sess.is_active());
    let live = s.create().unwrap();
    let sess = Session::from_cookie(s, Some(live.clone()));
    assert_eq!(sess.current_id(), Some(live.as_str()));
    assert!(!sess.was_started());
}

#[test]
fn start_is_idempotent_and_flags_new_session() {
    let mut sess = Session::from_cookie(store(), None);
    assert!(!sess.is_active());
    let a = sess.start().unwrap();
    let b = sess.start().unwrap();
    assert_eq!(a, b);
    assert!(sess.was_started());
}

#[test]
fn resume_reads_existing_attrs() {
    let s = store();
    let id = s.create().unwrap();
    s.set(&id, USER_KEY, json!("jackie"));
    let mut sess = Session::from_cookie(s, None);
    sess.resume(&id);
    assert_eq!(sess.user().as_deref(), Some("jackie"));
}

#[test]
fn set_starts_session_on_demand() {
    let mut sess = Session::from_cookie(store(), None);
    sess.set(USER_KEY, json!("amy")).unwrap();
    assert!(sess.is_active());
    assert_eq!(sess.user().as_deref(), Some("amy"));
}

#[test]
fn generated_ids_carry_full_entropy() {
    let id = gen_id().unwrap();
    assert_eq!(id.len(), 43);
    assert_ne!(id, "A".repeat(43));
}

/// Store whose id source is unavailable.
struct NoEntropyStore;

impl SessionStore for NoEntropyStore {
    fn create(&self) -> AppResult<String> {
        Err(AppError::internal("session_id_unavailable", "Unable to create session"))
    }
    fn exists(&self, _id: &str) -> bool { false }
    fn get(&self, _id: &str, _key: &str) -> Option<JsonValue> { None }
    fn set(&self, _id: &str, _key: &str, _value: JsonValue) {}
    fn remove(&self, _id: &str) -> bool { false }
}

#[test]
fn failed_id_generation_never_yields_a_session() {
    let mut sess = Session::from_cookie(Arc::new(NoEntropyStore), None);
    assert_eq!(sess.start().unwrap_err().http_status(), 500);
    assert!(sess.set(USER_KEY, json!("amy")).is_err());
    assert!(!sess.is_active());
    assert!(!sess.was_started());
}
