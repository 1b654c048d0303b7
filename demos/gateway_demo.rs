// Copyright (c) 2025 - Cowboy AI, LLC.

//! End-to-end walkthrough of the gateway against the in-memory client:
//! copy-on-write writes, range reads, key publication, and a bus round trip.

use std::sync::Arc;

use futures::StreamExt;
use can_gateway::{Gateway, MemoryClient, Request, EMPTY_DIR_CID};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let gateway = Gateway::new(Arc::new(MemoryClient::new()));

    // Write a file against the empty-directory sentinel
    let created = gateway
        .fetch(
            Request::put(format!("content://{EMPTY_DIR_CID}/hello.txt"))
                .with_body("Hello World!"),
        )
        .await;
    let location = created.header("location").unwrap().to_string();
    println!("wrote {location}");

    // Read a byte range back
    let ranged = gateway
        .fetch(Request::get(&location).with_header("range", "bytes=0-4"))
        .await;
    println!(
        "range says: {}",
        String::from_utf8(ranged.into_bytes().await?.to_vec())?
    );

    // Publish the new root under a fresh key and read through the name
    let key = gateway
        .fetch(Request::post("name://local/?key=demo"))
        .await;
    let name_url = key.header("location").unwrap().to_string();
    let root_url = location.trim_end_matches("hello.txt").to_string();
    gateway
        .fetch(Request::post(&name_url).with_body(root_url))
        .await;
    let listing = gateway.fetch(Request::get(&name_url)).await;
    println!(
        "published listing: {}",
        String::from_utf8(listing.into_bytes().await?.to_vec())?
    );

    // One message over the bus, framed as a server-sent event
    let sse = gateway
        .fetch(Request::get("bus://demo/").with_header("accept", "text/event-stream"))
        .await;
    let mut frames = sse.body.into_stream();
    gateway
        .fetch(Request::post("bus://demo/").with_body("ping"))
        .await;
    if let Some(Ok(frame)) = frames.next().await {
        print!("bus frame:\n{}", String::from_utf8(frame.to_vec())?);
    }

    Ok(())
}
