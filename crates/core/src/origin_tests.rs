use super::*;

fn validator() -> OriginValidator {
    OriginValidator::new(7497, None)
}

#[test]
fn empty_origin_is_allowed() {
    assert!(validator().is_allowed("", &[]));
}

#[test]
fn static_localhost_with_api_port_is_allowed() {
    assert!(validator().is_allowed("http://localhost:7497", &[]));
}

#[test]
fn localhost_is_allowed_on_any_port() {
    assert!(validator().is_allowed("http://localhost:99", &[]));
}

#[test]
fn fixed_mobile_origins_are_allowed() {
    assert!(validator().is_allowed("capacitor://localhost", &[]));
    assert!(validator().is_allowed("ionic://localhost", &[]));
}

#[test]
fn case_insensitive_match() {
    assert!(validator().is_allowed("HTTP://LOCALHOST:7497", &[]));
}

#[test]
fn private_ip_allowed_only_on_api_port() {
    let v = validator();
    assert!(v.is_allowed("http://192.168.1.50:7497", &[]));
    assert!(!v.is_allowed("http://192.168.1.50:8100", &[]));
}

#[test]
fn public_ip_is_rejected() {
    assert!(!validator().is_allowed("http://8.8.8.8:7497", &[]));
}

#[test]
fn dynamic_bare_host_generates_four_variants() {
    let v = validator();
    let dynamic = vec!["batocera.local".to_owned()];
    assert!(v.is_allowed("http://batocera.local", &dynamic));
    assert!(v.is_allowed("https://batocera.local", &dynamic));
    assert!(v.is_allowed("http://batocera.local:7497", &dynamic));
    assert!(v.is_allowed("https://batocera.local:7497", &dynamic));
}

#[test]
fn dynamic_scheme_host_without_port_also_allows_api_port_variant() {
    let v = validator();
    let dynamic = vec!["http://batocera.local".to_owned()];
    assert!(v.is_allowed("http://batocera.local", &dynamic));
    assert!(v.is_allowed("http://batocera.local:7497", &dynamic));
}

#[test]
fn malformed_double_scheme_origin_is_rejected() {
    let v = validator();
    let dynamic = vec!["http://batocera.local".to_owned()];
    assert!(!v.is_allowed("http://http://batocera.local", &dynamic));
}

#[test]
fn dynamic_entries_trim_whitespace_and_trailing_slash() {
    let variants = expand_dynamic_entry("  batocera.local/  ", 7497);
    assert!(variants.contains(&"http://batocera.local".to_owned()));
}

#[test]
fn scheme_validity() {
    assert!(is_valid_scheme("http"));
    assert!(is_valid_scheme("capacitor"));
    assert!(is_valid_scheme("a+b.c-d9"));
    assert!(!is_valid_scheme("1scheme"));
    assert!(!is_valid_scheme("-scheme"));
    assert!(!is_valid_scheme(".scheme"));
    assert!(!is_valid_scheme("sch eme"));
    assert!(!is_valid_scheme(""));
}
