use super::*;
use serde_json::json;

fn provider() -> StaticProvider {
    StaticProvider::new()
        .with_broker("shop1", "s3cr3t")
        .with_user("jackie", "jackie123", json!({"fullname": "Jackie Black", "email": "jackie@example.com"}))
        .unwrap()
}

#[test]
fn authenticate_accepts_correct_password() {
    let p = provider();
    assert!(p.authenticate("jackie", "jackie123", &HashMap::new()).is_ok());
}

#[test]
fn authenticate_rejects_wrong_password_and_unknown_user_alike() {
    let p = provider();
    let wrong = p.authenticate("jackie", "nope", &HashMap::new()).unwrap_err();
    let unknown = p.authenticate("ghost", "jackie123", &HashMap::new()).unwrap_err();
    assert_eq!(wrong, unknown);
}

#[test]
fn broker_info_resolves_secret() {
    let p = provider();
    assert_eq!(p.broker_info("shop1").map(|b| b.secret), Some("s3cr3t".to_string()));
    assert!(p.broker_info("shop2").is_none());
}

#[test]
fn user_info_includes_username() {
    let p = provider();
    let info = p.user_info("jackie").unwrap();
    assert_eq!(info["username"], "jackie");
    assert_eq!(info["fullname"], "Jackie Black");
    assert!(p.user_info("ghost").is_none());
}

#[test]
fn load_reads_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("providers.json");
    let phc = hash_password("pw").unwrap();
    let doc = json!({
        "brokers": {"blog": {"secret": "abc", "name": "The Blog"}},
        "users": {"amy": {"password_hash": phc, "info": {"role": "editor"}}}
    });
    std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();
    let p = StaticProvider::load(&path).unwrap();
    let blog = p.broker_info("blog").unwrap();
    assert_eq!(blog.secret, "abc");
    assert_eq!(blog.extra.get("name"), Some(&json!("The Blog")));
    assert!(p.authenticate("amy", "pw", &HashMap::new()).is_ok());
}
