// Copyright (c) 2025 - Cowboy AI, LLC.

//! URL algebra coverage: scheme recognition, host-as-root-token, segment
//! decoding and canonical CAN-path composition.

use can_gateway::{CanUrl, Scheme, RESERVED_HOST};
use pretty_assertions::assert_eq;
use test_case::test_case;

#[test_case("content://bafyroot/", Scheme::Content)]
#[test_case("name://alias/", Scheme::Name)]
#[test_case("linked://bafyroot/", Scheme::Linked)]
#[test_case("bus://topic/", Scheme::Bus)]
fn all_four_schemes_parse(url: &str, expected: Scheme) {
    assert_eq!(CanUrl::parse(url).unwrap().scheme(), expected);
}

#[test_case("http://host/")]
#[test_case("ipfs://bafyroot/")]
#[test_case("no-scheme-at-all")]
fn foreign_schemes_are_rejected(url: &str) {
    assert!(CanUrl::parse(url).is_err());
}

#[test]
fn host_position_is_never_a_filename() {
    let url = CanUrl::parse("content://example.txt").unwrap();
    assert_eq!(url.host(), "example.txt");
    assert!(url.segments().is_empty());

    let url = CanUrl::parse("content://bafyroot/example.txt").unwrap();
    assert_eq!(url.host(), "bafyroot");
    assert_eq!(url.segments(), ["example.txt"]);
}

#[test]
fn the_reserved_host_is_detected() {
    assert!(CanUrl::parse("name://local/?key=a").unwrap().is_local());
    assert_eq!(RESERVED_HOST, "local");
    assert!(!CanUrl::parse("name://localhost.dev/").unwrap().is_local());
}

#[test]
fn canonical_paths_re_encode_segments() {
    let url = CanUrl::parse("content://bafyroot/with%20space/file.txt").unwrap();
    assert_eq!(url.rel_path(), "with space/file.txt");
    assert_eq!(url.can_path(), "/content/bafyroot/with%20space/file.txt");
}

#[test]
fn name_urls_compose_name_tagged_paths() {
    let url = CanUrl::parse("name://k51abc/docs/readme.md").unwrap();
    assert_eq!(url.can_path(), "/name/k51abc/docs/readme.md");
}

#[test]
fn display_round_trips_the_decomposition() {
    for raw in [
        "content://bafyroot/a/b.txt",
        "name://local/",
        "bus://topic",
    ] {
        let url = CanUrl::parse(raw).unwrap();
        let reparsed = CanUrl::parse(&url.to_string()).unwrap();
        assert_eq!(reparsed.scheme(), url.scheme());
        assert_eq!(reparsed.host(), url.host());
        assert_eq!(reparsed.segments(), url.segments());
    }
}

#[test]
fn query_parameters_observed_by_the_gateway() {
    let url =
        CanUrl::parse("content://bafyroot/file?format=raw&filename=a.txt&noResolve").unwrap();
    assert_eq!(url.query("format"), Some("raw"));
    assert_eq!(url.query("filename"), Some("a.txt"));
    assert!(url.has_query("noResolve"));
    assert_eq!(url.query("key"), None);
}
