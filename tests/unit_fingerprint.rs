// Unit tests for n-gram fingerprints, Jaccard overlap, and embedding helpers.

use subprint::fingerprint::embeddings::{
    cosine_distance, decode_embedding, encode_embedding, similarity_from_distance,
    validate_embedding,
};
use subprint::fingerprint::{jaccard, Fingerprint};
use subprint::MatchError;

fn fp(text: &str) -> Fingerprint {
    Fingerprint::from_text(text, 3).unwrap()
}

// ============================================================
// Fingerprint construction
// ============================================================

#[test]
fn trigrams_of_short_word() {
    let f = fp("abcd");
    let grams: Vec<&str> = f.grams().collect();
    assert_eq!(grams, vec!["abc", "bcd"]);
}

#[test]
fn repeated_grams_counted_once() {
    assert_eq!(fp("aaaaaa").len(), 1);
}

#[test]
fn case_is_folded() {
    assert_eq!(fp("HELLO there"), fp("hello THERE"));
}

#[test]
fn markup_does_not_reach_the_fingerprint() {
    assert_eq!(fp("<i>Hello</i> {\\an8}there"), fp("Hello there"));
}

#[test]
fn text_shorter_than_width_is_empty() {
    assert!(fp("hi").is_empty());
    assert!(fp("").is_empty());
}

#[test]
fn zero_width_rejected() {
    let err = Fingerprint::from_text("hello", 0).unwrap_err();
    assert!(matches!(err, MatchError::Validation(_)));
}

#[test]
fn fingerprinting_is_deterministic() {
    let text = "Hello world, this is episode two.";
    let a = fp(text);
    let b = fp(text);
    assert_eq!(a, b);
    assert_eq!(a.to_canonical().unwrap(), b.to_canonical().unwrap());
}

#[test]
fn canonical_form_is_sorted_json() {
    assert_eq!(fp("cab").to_canonical().unwrap(), r#"["cab"]"#);
    assert_eq!(fp("abca").to_canonical().unwrap(), r#"["abc","bca"]"#);
}

#[test]
fn canonical_form_restores_equal_fingerprint() {
    let original = fp("The quick brown fox");
    let restored = Fingerprint::from_canonical(&original.to_canonical().unwrap(), 3).unwrap();
    assert_eq!(original, restored);
}

#[test]
fn corrupt_canonical_form_is_storage_error() {
    let err = Fingerprint::from_canonical("not json", 3).unwrap_err();
    assert!(matches!(err, MatchError::Storage(_)));

    let err = Fingerprint::from_canonical(r#"["abcd"]"#, 3).unwrap_err();
    assert!(matches!(err, MatchError::Storage(_)));
}

// ============================================================
// Jaccard
// ============================================================

#[test]
fn jaccard_of_self_is_one() {
    let a = fp("Hello world, this is episode two.");
    assert_eq!(jaccard(&a, &a), 1.0);
}

#[test]
fn jaccard_with_empty_is_zero() {
    let a = fp("Hello world");
    let empty = fp("");
    assert_eq!(jaccard(&a, &empty), 0.0);
    assert_eq!(jaccard(&empty, &a), 0.0);
    assert_eq!(jaccard(&empty, &empty), 0.0);
}

#[test]
fn jaccard_known_value() {
    // {abc, bcd} vs {bcd, cde}: 1 shared of 3 total
    let a = fp("abcd");
    let b = fp("bcde");
    assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn jaccard_is_symmetric_and_bounded() {
    let texts = [
        "Hello world",
        "Hello there world",
        "Completely unrelated sentence",
        "world hello",
        "a",
        "",
    ];
    for x in texts {
        for y in texts {
            let (a, b) = (fp(x), fp(y));
            let s = jaccard(&a, &b);
            assert!((0.0..=1.0).contains(&s), "out of bounds for {x:?} / {y:?}");
            assert_eq!(s, jaccard(&b, &a));
        }
    }
}

#[test]
fn jaccard_across_widths_is_zero() {
    let a = Fingerprint::from_text("hello world", 3).unwrap();
    let b = Fingerprint::from_text("hello world", 4).unwrap();
    assert_eq!(jaccard(&a, &b), 0.0);
}

// ============================================================
// Embeddings
// ============================================================

#[test]
fn embedding_validation() {
    assert!(validate_embedding(&[0.6, 0.8], 2).is_ok());
    assert!(validate_embedding(&[0.6, 0.8, 0.0], 2).is_err());
    assert!(validate_embedding(&[0.0, 0.0], 2).is_err());
    assert!(validate_embedding(&[f32::NAN, 1.0], 2).is_err());
    assert!(validate_embedding(&[f32::INFINITY, 1.0], 2).is_err());
}

#[test]
fn cosine_distance_extremes() {
    assert!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-6);
    assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
    assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
}

#[test]
fn similarity_clamps_opposite_vectors_to_zero() {
    assert_eq!(similarity_from_distance(2.0), 0.0);
    assert_eq!(similarity_from_distance(0.0), 1.0);
}

#[test]
fn embedding_bytes_are_little_endian_f32() {
    let bytes = encode_embedding(&[1.0, -0.5]);
    assert_eq!(bytes.len(), 8);
    assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
    assert_eq!(decode_embedding(&bytes).unwrap(), vec![1.0, -0.5]);
}

#[test]
fn truncated_embedding_blob_is_storage_error() {
    let err = decode_embedding(&[0, 0, 128]).unwrap_err();
    assert!(matches!(err, MatchError::Storage(_)));
}
