//! Tests for version parsing, historical ordering and bucket classification.
use kaitei::prelude::*;
use kaitei::version::{older_than, same_version};

#[test]
fn test_historical_version_chain_is_ordered() {
    // The complete set of version strings the format history ever used, in
    // their historical order.
    let history = [
        "0.0", "1.0", "3.0", "3.1", "3.2", "4.0", "4.1", "5", "5.1", "5.1.1", "6", "6.1", "6.2",
        "7.0",
    ];
    for pair in history.windows(2) {
        let older = FormatVersion::parse(pair[0]).expect("parses");
        let newer = FormatVersion::parse(pair[1]).expect("parses");
        assert!(older < newer, "{} must order before {}", pair[0], pair[1]);
    }
}

#[test]
fn test_two_digit_segments_order_numerically() {
    // The lexical trap: plain string comparison would put "3.10" first.
    assert!(older_than("3.2", "3.10"));
    assert!(!older_than("3.10", "3.2"));
}

#[test]
fn test_missing_segments_compare_as_zero() {
    assert!(same_version("5", "5.0"));
    assert!(same_version("5", "5.0.0"));
    assert!(!same_version("5", "5.0.1"));
}

#[test]
fn test_malformed_versions_do_not_parse() {
    for raw in ["", "abc", "1.x", "1..2", "-1"] {
        assert!(FormatVersion::parse(raw).is_none(), "'{raw}' must not parse");
    }
}

#[test]
fn test_unparseable_versions_fall_back_to_literal_equality() {
    assert!(same_version("x.y", "x.y"));
    assert!(!same_version("x.y", "5"));
    assert!(!older_than("x.y", "5"));
}

#[test]
fn test_classify_missing_version_is_older_than_everything() {
    let interactive = classify(None, true);
    assert!(interactive.contains(FormatBucket::BeforeVersion3));
    assert!(interactive.contains(FormatBucket::ForVersion3));
    assert!(interactive.contains(FormatBucket::AfterVersion3));
}

#[test]
fn test_classify_silent_is_limited_to_legacy_buckets() {
    let version = FormatVersion::parse("0.0").unwrap();
    let silent = classify(Some(&version), false);
    assert!(silent.contains(FormatBucket::BeforeVersion3));
    assert!(silent.contains(FormatBucket::ForVersion3));
    assert!(!silent.contains(FormatBucket::AfterVersion3));
}

#[test]
fn test_classify_structured_document() {
    let version = FormatVersion::parse("4").unwrap();
    let interactive = classify(Some(&version), true);
    assert!(!interactive.contains(FormatBucket::BeforeVersion3));
    assert!(!interactive.contains(FormatBucket::ForVersion3));
    assert!(interactive.contains(FormatBucket::AfterVersion3));
}

#[test]
fn test_classify_current_document_is_empty() {
    let version = FormatVersion::parse(CURRENT_WORKFLOW_VERSION).unwrap();
    assert!(classify(Some(&version), true).is_empty());
    assert!(classify(Some(&version), false).is_empty());
}

#[test]
fn test_bucket_set_algebra() {
    let mut set = BucketSet::NONE;
    assert!(set.is_empty());
    set.insert(FormatBucket::ForVersion3);
    assert!(set.contains(FormatBucket::ForVersion3));
    assert!(!set.contains(FormatBucket::AfterVersion3));

    let both = set | FormatBucket::AfterVersion3;
    assert!(both.contains(FormatBucket::ForVersion3));
    assert!(both.contains(FormatBucket::AfterVersion3));
    assert_eq!(set | set, set);
}
