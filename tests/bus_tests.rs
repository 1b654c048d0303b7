// Copyright (c) 2025 - Cowboy AI, LLC.

//! Pubsub bus coverage: membership JSON, publication, SSE framing across
//! payload encodings, in-band error events, and subscription release on
//! cancellation.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use can_gateway::{CanClient, Gateway, MemoryClient, Request, Response};

fn gateway() -> (Gateway, Arc<MemoryClient>) {
    let client = Arc::new(MemoryClient::new());
    (Gateway::new(client.clone()), client)
}

async fn text(response: Response) -> String {
    String::from_utf8(response.into_bytes().await.unwrap().to_vec()).unwrap()
}

fn sse_request(url: &str, cancel: &CancellationToken) -> Request {
    Request::get(url)
        .with_header("accept", "text/event-stream")
        .with_cancel(cancel.clone())
}

/// Pull one SSE frame off the stream as text
async fn next_frame(stream: &mut can_gateway::ByteStream) -> String {
    let chunk = stream.next().await.expect("stream open").expect("frame ok");
    String::from_utf8(chunk.to_vec()).unwrap()
}

#[tokio::test]
async fn membership_json_reflects_subscriptions() {
    let (gw, _) = gateway();

    let before = gw.fetch(Request::get("bus://news/")).await;
    assert_eq!(before.status, StatusCode::OK);
    assert_eq!(before.header("content-type"), Some("application/json"));
    let value: Value = serde_json::from_str(&text(before).await).unwrap();
    assert_eq!(value["topic"], "news");
    assert_eq!(value["subscribed"], false);
    assert!(value["id"].as_str().unwrap().starts_with("peer-"));

    let cancel = CancellationToken::new();
    let open = gw.fetch(sse_request("bus://news/", &cancel)).await;
    assert_eq!(open.header("content-type"), Some("text/event-stream"));

    let during = gw.fetch(Request::get("bus://news/")).await;
    let value: Value = serde_json::from_str(&text(during).await).unwrap();
    assert_eq!(value["subscribed"], true);

    drop(open);
    cancel.cancel();
}

#[tokio::test]
async fn published_messages_arrive_as_hex_id_frames() {
    let (gw, _) = gateway();
    let cancel = CancellationToken::new();

    let response = gw.fetch(sse_request("bus://news/", &cancel)).await;
    let mut stream = response.body.into_stream();

    let posted = gw
        .fetch(Request::post("bus://news/").with_body("hi"))
        .await;
    assert_eq!(posted.status, StatusCode::OK);

    let frame = next_frame(&mut stream).await;
    assert!(frame.starts_with("id: 0\n"), "frame was: {frame}");
    let data_line = frame
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .unwrap();
    let event: Value = serde_json::from_str(data_line).unwrap();
    // Default payload encoding is base64
    assert_eq!(event["data"], "aGk=");
    assert!(event["from"].as_str().unwrap().starts_with("peer-"));

    // Per-topic order is preserved and the sequence is hex
    for expected in ["one", "two"] {
        gw.fetch(Request::post("bus://news/").with_body(expected.to_string()))
            .await;
    }
    let frame = next_frame(&mut stream).await;
    assert!(frame.starts_with("id: 1\n"));
    let frame = next_frame(&mut stream).await;
    assert!(frame.starts_with("id: 2\n"));

    cancel.cancel();
}

#[tokio::test]
async fn utf8_and_json_payload_encodings() {
    let (gw, _) = gateway();

    let cancel = CancellationToken::new();
    let response = gw
        .fetch(sse_request("bus://chat/?format=utf8", &cancel))
        .await;
    let mut stream = response.body.into_stream();
    gw.fetch(Request::post("bus://chat/").with_body("plain text"))
        .await;
    let frame = next_frame(&mut stream).await;
    let data_line = frame
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .unwrap();
    let event: Value = serde_json::from_str(data_line).unwrap();
    assert_eq!(event["data"], "plain text");
    cancel.cancel();

    let cancel = CancellationToken::new();
    let response = gw
        .fetch(sse_request("bus://chat/?format=json", &cancel))
        .await;
    let mut stream = response.body.into_stream();
    gw.fetch(Request::post("bus://chat/").with_body(r#"{"n":1}"#))
        .await;
    let frame = next_frame(&mut stream).await;
    let data_line = frame
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .unwrap();
    let event: Value = serde_json::from_str(data_line).unwrap();
    assert_eq!(event["data"]["n"], 1);
    cancel.cancel();
}

#[tokio::test]
async fn malformed_payloads_surface_as_error_events() {
    let (gw, _) = gateway();
    let cancel = CancellationToken::new();
    let response = gw
        .fetch(sse_request("bus://strict/?format=json", &cancel))
        .await;
    let mut stream = response.body.into_stream();

    gw.fetch(Request::post("bus://strict/").with_body("not json"))
        .await;
    let frame = next_frame(&mut stream).await;
    assert!(frame.starts_with("event: error\n"), "frame was: {frame}");

    // The stream stays open for well-formed messages afterwards
    gw.fetch(Request::post("bus://strict/").with_body("{}"))
        .await;
    let frame = next_frame(&mut stream).await;
    assert!(frame.starts_with("id: 0\n"));

    cancel.cancel();
}

#[tokio::test]
async fn unknown_payload_encoding_is_rejected() {
    let (gw, _) = gateway();
    let cancel = CancellationToken::new();
    let response = gw
        .fetch(sse_request("bus://news/?format=hex", &cancel))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancellation_releases_the_subscription() {
    let (gw, client) = gateway();
    let cancel = CancellationToken::new();
    let response = gw.fetch(sse_request("bus://news/", &cancel)).await;
    let mut stream = response.body.into_stream();
    assert_eq!(client.subscriptions().await.unwrap(), ["news"]);

    cancel.cancel();
    assert!(stream.next().await.is_none());
    drop(stream);

    // Release happens off the stream's drop path
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(client.subscriptions().await.unwrap().is_empty());
}

#[tokio::test]
async fn the_route_matrix_gates_bus_methods() {
    let (gw, _) = gateway();
    let put = gw.fetch(Request::put("bus://news/").with_body("x")).await;
    assert_eq!(put.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(put.header("allow"), Some("GET, POST"));
}
