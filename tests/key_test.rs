//! Unit tests for image key derivation
//!
//! Keys must be deterministic, injective over their four components, and
//! safe against delimiter collisions.

use regwatch::ImageKey;

#[test]
fn test_key_is_deterministic() {
    let a = ImageKey::new("prod", "quay.io", "team/svc", "v1");
    let b = ImageKey::new("prod", "quay.io", "team/svc", "v1");

    assert_eq!(a, b);
    assert_eq!(a.encode(), b.encode());
    assert_eq!(a.file_stem(), b.file_stem());
}

#[test]
fn test_key_differs_per_component() {
    let base = ImageKey::new("prod", "quay.io", "team/svc", "v1");

    let variants = [
        ImageKey::new("staging", "quay.io", "team/svc", "v1"),
        ImageKey::new("prod", "ghcr.io", "team/svc", "v1"),
        ImageKey::new("prod", "quay.io", "team/other", "v1"),
        ImageKey::new("prod", "quay.io", "team/svc", "v2"),
    ];

    for variant in &variants {
        assert_ne!(&base, variant);
        assert_ne!(base.encode(), variant.encode());
    }
}

#[test]
fn test_colons_in_components_do_not_collide() {
    // Without escaping these two tuples would produce the same encoding
    let a = ImageKey::new("prod", "localhost:5000", "svc", "v1");
    let b = ImageKey::new("prod", "localhost", "5000:svc", "v1");

    assert_ne!(a.encode(), b.encode());

    let parsed = ImageKey::parse(&a.encode()).unwrap();
    assert_eq!(parsed.registry, "localhost:5000");
    assert_eq!(parsed.repository, "svc");
}

#[test]
fn test_percent_in_components_round_trips() {
    let key = ImageKey::new("prod", "quay.io", "odd%name", "v%3A1");
    let parsed = ImageKey::parse(&key.encode()).unwrap();

    assert_eq!(parsed, key);
}

#[test]
fn test_encode_parse_round_trip() {
    let key = ImageKey::new("prod-account", "registry.example.com:443", "library/nginx", "1.27");
    let encoded = key.encode();

    assert!(encoded.starts_with("regwatch:v2:"));
    assert_eq!(ImageKey::parse(&encoded).unwrap(), key);
}

#[test]
fn test_parse_rejects_malformed_keys() {
    assert!(ImageKey::parse("not-a-key").is_err());
    assert!(ImageKey::parse("regwatch:v2:only:three:parts").is_err());
    assert!(ImageKey::parse("regwatch:v2:a:b:c:d:extra").is_err());
    assert!(ImageKey::parse("otherprefix:v2:a:b:c:d").is_err());
}

#[test]
fn test_file_stem_is_hex_sha256() {
    let key = ImageKey::new("prod", "quay.io", "team/svc", "v1");
    let stem = key.file_stem();

    assert_eq!(stem.len(), 64);
    assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
}
