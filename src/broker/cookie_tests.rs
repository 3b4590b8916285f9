use super::*;

#[test]
fn cookie_name_is_sanitized() {
    assert_eq!(cookie_name("shop1"), "sso_token_shop1");
    assert_eq!(cookie_name("My Shop__EU.west"), "sso_token_my_shop_eu_west");
    assert_eq!(cookie_name("a--b"), "sso_token_a_b");
}

#[test]
fn header_value_carries_attributes() {
    let c = Cookie::new("sso_token_shop1", "ab cd", Duration::from_secs(7200));
    let h = c.to_header_value();
    assert!(h.starts_with("sso_token_shop1=ab%20cd; Max-Age=7200; Expires="), "{}", h);
    assert!(h.contains(" GMT; Path=/"), "{}", h);
    assert!(h.ends_with("; HttpOnly"), "{}", h);
}

#[test]
fn jar_set_get_remove() {
    let jar = MemoryCookieJar::new();
    assert!(jar.get("x").is_none());
    jar.set(Cookie::new("x", "1", Duration::from_secs(60)));
    assert_eq!(jar.get("x").as_deref(), Some("1"));
    assert_eq!(jar.header_values().len(), 1);
    jar.remove("x");
    assert!(jar.get("x").is_none());
}

#[test]
fn jar_drops_expired_cookies() {
    let jar = MemoryCookieJar::new();
    jar.set(Cookie::new("x", "1", Duration::from_secs(0)));
    assert!(jar.get("x").is_none());
    assert!(jar.header_values().is_empty());
}
