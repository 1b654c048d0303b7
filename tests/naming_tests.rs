// Copyright (c) 2025 - Cowboy AI, LLC.

//! Naming subsystem coverage: key lifecycle on the reserved host, record
//! publication, reads through resolved names, DNS-style hosts, and
//! write-then-publish under a key.

use std::sync::Arc;

use http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;

use can_gateway::{CanClient, CanUrl, Gateway, MemoryClient, Request, Response, EMPTY_DIR_CID};

fn gateway() -> (Gateway, Arc<MemoryClient>) {
    let client = Arc::new(MemoryClient::new());
    (Gateway::new(client.clone()), client)
}

async fn text(response: Response) -> String {
    String::from_utf8(response.into_bytes().await.unwrap().to_vec()).unwrap()
}

const BOUNDARY: &str = "----gatewayform";

fn form_request(url: &str, files: &[(&str, &str)]) -> Request {
    let mut body = Vec::new();
    for (filename, content) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(content.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Request::put(url)
        .with_header(
            "content-type",
            &format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .with_body(body)
}

#[tokio::test]
async fn key_lifecycle_on_the_reserved_host() {
    let (gw, _) = gateway();

    let missing = gw.fetch(Request::get("name://local/?key=alpha")).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let created = gw.fetch(Request::post("name://local/?key=alpha")).await;
    assert_eq!(created.status, StatusCode::CREATED);
    let location = created.header("location").unwrap().to_string();
    assert!(location.starts_with("name://k"));
    assert!(location.ends_with('/'));

    // Creation is idempotent and the redirect target is stable
    let again = gw.fetch(Request::post("name://local/?key=alpha")).await;
    assert_eq!(again.status, StatusCode::CREATED);
    assert_eq!(again.header("location"), Some(location.as_str()));

    let redirect = gw.fetch(Request::get("name://local/?key=alpha")).await;
    assert_eq!(redirect.status, StatusCode::FOUND);
    assert_eq!(redirect.header("location"), Some(location.as_str()));

    let redirect_again = gw.fetch(Request::get("name://local/?key=alpha")).await;
    assert_eq!(redirect_again.header("location"), Some(location.as_str()));

    let listing = gw.fetch(Request::get("name://local/")).await;
    assert_eq!(listing.status, StatusCode::OK);
    let keys: Value = serde_json::from_str(&text(listing).await).unwrap();
    assert_eq!(keys[0]["name"], "alpha");

    let removed = gw.fetch(Request::delete("name://local/?key=alpha")).await;
    assert_eq!(removed.status, StatusCode::OK);
    let gone = gw.fetch(Request::get("name://local/?key=alpha")).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fresh_keys_resolve_to_an_empty_directory() {
    let (gw, _) = gateway();
    let created = gw.fetch(Request::post("name://local/?key=fresh")).await;
    let name_url = created.header("location").unwrap().to_string();

    let listing = gw.fetch(Request::get(&name_url)).await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(text(listing).await, "[]");
}

#[tokio::test]
async fn publishing_a_folder_url_makes_it_readable_under_the_name() {
    let (gw, _) = gateway();

    let folder = gw
        .fetch(form_request(
            &format!("content://{EMPTY_DIR_CID}/"),
            &[("example.txt", "Hello World!"), ("example2.txt", "Hello World!")],
        ))
        .await;
    let folder_url = folder.header("location").unwrap().to_string();

    let created = gw.fetch(Request::post("name://local/?key=put-file")).await;
    assert_eq!(created.status, StatusCode::CREATED);
    let name_url = created.header("location").unwrap().to_string();

    let published = gw
        .fetch(Request::post(&name_url).with_body(folder_url.clone()))
        .await;
    assert_eq!(published.status, StatusCode::CREATED);
    assert_eq!(published.header("location"), Some(name_url.as_str()));

    let direct = text(gw.fetch(Request::get(&folder_url)).await).await;
    let named = text(gw.fetch(Request::get(&name_url)).await).await;
    assert_eq!(named, direct);
    assert_eq!(named, r#"["example.txt","example2.txt"]"#);
}

#[tokio::test]
async fn put_under_a_name_writes_and_publishes() {
    let (gw, _) = gateway();
    let created = gw.fetch(Request::post("name://local/?key=edit")).await;
    let name_url = created.header("location").unwrap().to_string();
    let host = CanUrl::parse(&name_url).unwrap().host().to_string();

    let put = gw
        .fetch(
            Request::put(format!("name://{host}/notes/hello.txt")).with_body("Hello World!"),
        )
        .await;
    assert_eq!(put.status, StatusCode::CREATED);
    // The Location is the name URL, not the underlying content URL
    let location = put.header("location").unwrap().to_string();
    assert_eq!(location, format!("name://{host}/notes/hello.txt"));

    let fetched = gw.fetch(Request::get(&location)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(text(fetched).await, "Hello World!");

    let root_listing = gw.fetch(Request::get(format!("name://{host}/"))).await;
    assert_eq!(text(root_listing).await, r#"["notes/"]"#);

    // Alias and public id address the same key
    let via_alias = gw
        .fetch(Request::put("name://edit/notes/second.txt").with_body("two"))
        .await;
    assert_eq!(via_alias.status, StatusCode::CREATED);
    let listing = gw
        .fetch(Request::get(format!("name://{host}/notes/")))
        .await;
    assert_eq!(text(listing).await, r#"["hello.txt","second.txt"]"#);
}

#[tokio::test]
async fn delete_under_a_name_publishes_the_pruned_root() {
    let (gw, _) = gateway();
    let created = gw.fetch(Request::post("name://local/?key=prune")).await;
    let host = CanUrl::parse(created.header("location").unwrap())
        .unwrap()
        .host()
        .to_string();

    gw.fetch(Request::put(format!("name://{host}/a.txt")).with_body("a"))
        .await;
    gw.fetch(Request::put(format!("name://{host}/b.txt")).with_body("b"))
        .await;

    let deleted = gw
        .fetch(Request::delete(format!("name://{host}/a.txt")))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(
        deleted.header("location"),
        Some(format!("name://{host}/").as_str())
    );

    let listing = gw.fetch(Request::get(format!("name://{host}/"))).await;
    assert_eq!(text(listing).await, r#"["b.txt"]"#);
}

#[tokio::test]
async fn dotted_hosts_resolve_as_dns_names() {
    let (gw, client) = gateway();

    let put = gw
        .fetch(
            Request::put(format!("content://{EMPTY_DIR_CID}/page.txt")).with_body("via dns"),
        )
        .await;
    let location = put.header("location").unwrap().to_string();
    let root = CanUrl::parse(&location).unwrap().host().to_string();
    client
        .set_dns_link("docs.example.com", &format!("/content/{root}/"))
        .await;

    let fetched = gw
        .fetch(Request::get("name://docs.example.com/page.txt"))
        .await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(text(fetched).await, "via dns");

    let unknown = gw.fetch(Request::get("name://nolink.example.com/")).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn publishing_requires_a_known_key() {
    let (gw, _) = gateway();
    let response = gw
        .fetch(Request::post("name://unknown-alias/").with_body("content://bafyaabakaieac/"))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_content_urls_publish_under_a_name() {
    let (gw, _) = gateway();
    gw.fetch(Request::post("name://local/?key=target")).await;
    gw.fetch(Request::post("name://local/?key=other")).await;

    for body in ["bus://topic/", "name://other/", "linked://bafyroot/"] {
        let response = gw
            .fetch(Request::post("name://target/").with_body(body))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "accepted {body}");
    }

    // The record is untouched by the rejected attempts
    let listing = gw.fetch(Request::get("name://target/")).await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(text(listing).await, "[]");
}

#[tokio::test]
async fn puts_refuse_records_that_leave_the_content_space() {
    let (gw, client) = gateway();
    let created = gw.fetch(Request::post("name://local/?key=astray")).await;
    let host = CanUrl::parse(created.header("location").unwrap())
        .unwrap()
        .host()
        .to_string();

    // A record planted behind the gateway's back, pointing at another name
    client
        .name_publish("astray", "/name/somewhere-else/", true)
        .await
        .unwrap();

    let put = gw
        .fetch(Request::put(format!("name://{host}/a.txt")).with_body("x"))
        .await;
    assert_eq!(put.status, StatusCode::BAD_REQUEST);
}
