// Copyright (c) 2025 - Cowboy AI, LLC.

//! # CAN Gateway
//!
//! A protocol adapter that exposes a content-addressed peer-to-peer data
//! network through a request/response interface modeled on the web fetch
//! contract. Callers hand in a method, a URL under one of four schemes,
//! headers, a body, and a cancellation signal; they get back a status,
//! headers, and a possibly-streaming body.
//!
//! - **`content://`**: immutable content roots — streamed reads with range
//!   support, directory listings, copy-on-write writes yielding new roots
//! - **`name://`**: the mutable naming layer — key lifecycle, record
//!   publication, and reads through resolved names
//! - **`linked://`**: the linked-data graph — typed values, deterministic
//!   JSON/CBOR encodings, JSON-Patch mutation
//! - **`bus://`**: the publish/subscribe bus — publication and
//!   server-sent-event subscriptions
//!
//! ## Design Principles
//!
//! 1. **Borrowed client**: the gateway drives a [`CanClient`] it does not
//!    own; every capability call is raced against the request signal and a
//!    configured deadline
//! 2. **Copy-on-write**: writes stage a scratch workspace and return a new
//!    root identifier; the adapter holds no long-lived mutable references
//! 3. **Streaming end-to-end**: bodies stay lazy in both directions and end
//!    when the request signal closes
//! 4. **Stable identifiers**: emitted URLs always carry version-1 CIDs,
//!    base32 for content and base36 for key identifiers
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use can_gateway::{Gateway, MemoryClient, Request, EMPTY_DIR_CID};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let gateway = Gateway::new(Arc::new(MemoryClient::new()));
//!
//! let put = Request::put(format!("content://{EMPTY_DIR_CID}/hello.txt"))
//!     .with_body("Hello World!");
//! let created = gateway.fetch(put).await;
//! let location = created.header("location").unwrap().to_string();
//!
//! let fetched = gateway.fetch(Request::get(&location)).await;
//! assert_eq!(&fetched.into_bytes().await.unwrap()[..], b"Hello World!");
//! # }
//! ```

#![warn(missing_docs)]

mod errors;
mod handlers;
mod linked;
mod multipart;
mod naming;
mod negotiate;
mod range;
mod router;
mod serve;
mod tree;

pub mod cid;
pub mod client;
pub mod memory;
pub mod request;
pub mod sse;
pub mod url;

// Re-export core types
pub use cid::{Cid, EMPTY_DIR_CID};
pub use client::{
    BusMessage, BusStream, CanClient, DirEntry, EntryKind, EntryStat, KeyInfo, WriteOptions,
};
pub use errors::{GatewayError, GatewayResult};
pub use memory::MemoryClient;
pub use negotiate::ResponseFormat;
pub use range::ByteRange;
pub use request::{Body, ByteStream, Request, Response};
pub use router::{Gateway, GatewayConfig, IndexRenderer, NotFoundHandler};
pub use sse::SseEvent;
pub use url::{CanUrl, Scheme, RESERVED_HOST};
