use super::*;

fn hash_of(f: impl FnOnce(&mut StableHasher)) -> Fingerprint {
    let mut h = StableHasher::new();
    f(&mut h);
    h.finish()
}

#[test]
fn same_input_same_fingerprint() {
    let a = hash_of(|h| {
        h.write_str("blur");
        h.write_f64(1.5);
    });
    let b = hash_of(|h| {
        h.write_str("blur");
        h.write_f64(1.5);
    });
    assert_eq!(a, b);
}

#[test]
fn order_changes_fingerprint() {
    let a = hash_of(|h| {
        h.write_u32(1);
        h.write_u32(2);
    });
    let b = hash_of(|h| {
        h.write_u32(2);
        h.write_u32(1);
    });
    assert_ne!(a, b);
}

#[test]
fn strings_are_length_prefixed() {
    let a = hash_of(|h| {
        h.write_str("ab");
        h.write_str("c");
    });
    let b = hash_of(|h| {
        h.write_str("a");
        h.write_str("bc");
    });
    assert_ne!(a, b);
}

#[test]
fn negative_zero_hashes_like_zero() {
    assert_eq!(hash_of(|h| h.write_f64(-0.0)), hash_of(|h| h.write_f64(0.0)));
}

#[test]
fn display_is_32_hex_digits() {
    let s = hash_of(|h| h.write_bool(true)).to_string();
    assert_eq!(s.len(), 32);
    assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
}
