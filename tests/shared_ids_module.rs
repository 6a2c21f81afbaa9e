use std::collections::HashSet;
use worklink::shared::ids::{new_message_id, RepositoryRef};

#[test]
fn well_formed_references_parse() {
    let parsed = RepositoryRef::parse("github.com/acme/widget").expect("parse");
    assert_eq!(parsed.as_str(), "github.com/acme/widget");
    assert_eq!(parsed.host(), "github.com");
    assert_eq!(parsed.owner(), "acme");
    assert_eq!(parsed.name(), "widget");

    assert!(RepositoryRef::parse("gitlab.example.com/team_x/app.core-v2").is_ok());
    assert!(RepositoryRef::parse("  github.com/acme/widget  ").is_ok());
}

#[test]
fn references_without_three_segments_are_rejected() {
    assert!(RepositoryRef::parse("acme/widget").is_err());
    assert!(RepositoryRef::parse("github.com/acme/widget/extra").is_err());
    assert!(RepositoryRef::parse("widget").is_err());
    assert!(RepositoryRef::parse("").is_err());
    assert!(RepositoryRef::parse("   ").is_err());
}

#[test]
fn empty_segments_are_rejected() {
    assert!(RepositoryRef::parse("github.com//widget").is_err());
    assert!(RepositoryRef::parse("/acme/widget").is_err());
    assert!(RepositoryRef::parse("github.com/acme/").is_err());
}

#[test]
fn illegal_characters_are_rejected() {
    assert!(RepositoryRef::parse("github.com/ac me/widget").is_err());
    assert!(RepositoryRef::parse("github.com/acme/wid!get").is_err());
    assert!(RepositoryRef::parse("github.com/acme/wid get").is_err());
    // Underscore is allowed in owner and name but not host.
    assert!(RepositoryRef::parse("git_host/acme/widget").is_err());
}

#[test]
fn repository_ref_deserializes_with_validation() {
    let ok: Result<RepositoryRef, _> = serde_json::from_str(r#""github.com/acme/widget""#);
    assert!(ok.is_ok());
    let bad: Result<RepositoryRef, _> = serde_json::from_str(r#""not-a-ref""#);
    assert!(bad.is_err());
}

#[test]
fn message_ids_are_prefixed_and_unique_enough() {
    let mut seen = HashSet::new();
    for _ in 0..200 {
        let id = new_message_id(1_714_564_800_000);
        assert!(id.starts_with("msg-"));
        seen.insert(id);
    }
    // Same millisecond, random suffixes: collisions should be rare.
    assert!(seen.len() > 190);
}

#[test]
fn later_timestamps_sort_after_earlier_ones() {
    let earlier = new_message_id(1_714_564_800_000);
    let later = new_message_id(1_714_564_900_000);
    // Equal-length base36 prefixes sort lexicographically with time.
    assert!(later > earlier);
}
