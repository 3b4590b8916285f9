use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AppError::validation("bad_input", "oops").http_status(), 400);
    assert_eq!(AppError::authorization("not_attached", "no").http_status(), 403);
    assert_eq!(AppError::protocol("session_conflict", "confused").http_status(), 400);
    assert_eq!(AppError::not_found("unknown_command", "missing").http_status(), 404);
    assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
}

#[test]
fn only_protocol_violations_are_fatal() {
    assert!(AppError::protocol("session_conflict", "x").is_fatal());
    assert!(!AppError::validation("v", "x").is_fatal());
    assert!(!AppError::authorization("a", "x").is_fatal());
    assert!(!AppError::internal("i", "x").is_fatal());
}

#[test]
fn display_joins_code_and_message() {
    let e = AppError::authorization("checksum_failed", "Checksum failed");
    assert_eq!(e.to_string(), "checksum_failed: Checksum failed");
    assert_eq!(e.code_str(), "checksum_failed");
    assert_eq!(e.message(), "Checksum failed");
}

#[test]
fn anyhow_maps_to_internal() {
    let e: AppError = anyhow::anyhow!("boom").into();
    assert_eq!(e.http_status(), 500);
    assert_eq!(e.message(), "boom");
}

#[test]
fn serde_tagging_is_snake_case() {
    let v = serde_json::to_value(AppError::protocol("c", "m")).unwrap();
    assert_eq!(v["type"], "protocol_violation");
    assert_eq!(v["code"], "c");
}
