// Copyright (c) 2025 - Cowboy AI, LLC.

//! CAN client capability surface
//!
//! The gateway drives an embedded client for the content-addressed network;
//! it never owns one. [`CanClient`] is the full capability surface the
//! request handlers compose: content tree reads and writes, block and
//! archive transfer, linked-data nodes, the mutable-name key set, and the
//! publish/subscribe bus.
//!
//! Path arguments use canonical CAN-paths (`/content/<cid>/…`,
//! `/name/<key>/…`) for addressed reads and plain rooted paths
//! (`/gateway-tmp/<hex>/…`) for the client's mutable scratch tree.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::{GatewayError, GatewayResult};
use crate::request::ByteStream;

/// Kind of a resolved entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory node
    Directory,
    /// Raw block without tree structure
    Raw,
}

/// Entry descriptor produced by the export capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStat {
    /// Identifier of the resolved node
    pub cid: Cid,
    /// Entry kind
    pub kind: EntryKind,
    /// Payload size in bytes (files and raw blocks)
    pub size: u64,
}

/// Immutable view of one directory child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Child name
    pub name: String,
    /// Child kind
    pub kind: EntryKind,
    /// Payload size for files, 0 for directories
    pub size: u64,
}

/// A keypair held in the client's key set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Local alias
    pub name: String,
    /// CID of the public key (version 1, libp2p-key codec)
    pub id: Cid,
}

/// One message delivered on a bus topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Sender identifier
    pub from: String,
    /// Raw payload bytes
    pub data: Bytes,
}

/// Stream of bus messages for one subscription
pub type BusStream = BoxStream<'static, GatewayResult<BusMessage>>;

/// Options applied to tree writes
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Create missing parent directories
    pub create_parents: bool,
    /// Truncate an existing file at the target
    pub truncate: bool,
    /// Store leaves as raw blocks
    pub raw_leaves: bool,
    /// CID version for newly created nodes
    pub cid_version: u8,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            create_parents: true,
            truncate: true,
            raw_leaves: true,
            cid_version: 1,
        }
    }
}

/// Capability surface of the embedded CAN client
#[async_trait]
pub trait CanClient: Send + Sync {
    // --- content tree ---

    /// Resolve a path to its entry descriptor
    async fn stat(&self, path: &str) -> GatewayResult<EntryStat>;

    /// Stream file bytes, optionally a sub-slice
    async fn cat(
        &self,
        path: &str,
        offset: Option<u64>,
        length: Option<u64>,
    ) -> GatewayResult<ByteStream>;

    /// List the immediate children of a directory
    async fn ls(&self, path: &str) -> GatewayResult<Vec<DirEntry>>;

    /// Write a file into the mutable scratch tree
    async fn write(&self, path: &str, data: Bytes, opts: WriteOptions) -> GatewayResult<()>;

    /// Create a directory in the mutable scratch tree
    async fn mkdir(&self, path: &str) -> GatewayResult<()>;

    /// Copy an addressed node into the mutable scratch tree
    async fn copy(&self, from: &str, to: &str) -> GatewayResult<()>;

    /// Remove a node from the mutable scratch tree
    async fn remove(&self, path: &str, recursive: bool) -> GatewayResult<()>;

    // --- blocks and archives ---

    /// Fetch one raw block
    async fn block_get(&self, cid: &Cid) -> GatewayResult<Bytes>;

    /// Export the DAG rooted at a CID as an archive stream
    async fn export_car(&self, cid: &Cid) -> GatewayResult<ByteStream>;

    /// Import an archive, returning its root identifiers
    async fn import_car(&self, data: Bytes) -> GatewayResult<Vec<Cid>>;

    // --- linked data ---

    /// Decode the node behind a CID into a typed value
    async fn dag_get(&self, cid: &Cid) -> GatewayResult<serde_json::Value>;

    /// Store a typed value under the given multicodec, returning its CID
    async fn dag_put(&self, value: &serde_json::Value, codec: u64) -> GatewayResult<Cid>;

    // --- mutable naming ---

    /// List the local key set
    async fn key_list(&self) -> GatewayResult<Vec<KeyInfo>>;

    /// Create a keypair under an alias
    async fn key_gen(&self, alias: &str) -> GatewayResult<KeyInfo>;

    /// Remove a keypair; `None` when the alias is unknown
    async fn key_remove(&self, alias: &str) -> GatewayResult<Option<KeyInfo>>;

    /// Publish a CAN-path record under a key alias
    async fn name_publish(&self, alias: &str, path: &str, offline: bool) -> GatewayResult<()>;

    /// Resolve a mutable name (key id or DNS-style) to a CAN-path
    async fn name_resolve(&self, name: &str) -> GatewayResult<String>;

    // --- publish/subscribe bus ---

    /// Identifier of the local peer
    async fn peer_id(&self) -> GatewayResult<String>;

    /// Open a subscription on a topic
    async fn subscribe(&self, topic: &str) -> GatewayResult<BusStream>;

    /// Release a subscription on a topic
    async fn unsubscribe(&self, topic: &str) -> GatewayResult<()>;

    /// Publish bytes to a topic
    async fn publish(&self, topic: &str, data: Bytes) -> GatewayResult<()>;

    /// Topics the local peer is currently subscribed to
    async fn subscriptions(&self) -> GatewayResult<Vec<String>>;
}

/// Deadline guard for capability calls.
///
/// Every suspension point races the call against the request signal and the
/// configured timeout, so cancellation propagates into the client and a slow
/// network surfaces as a timeout kind rather than a hung response.
#[derive(Clone)]
pub struct Deadline {
    cancel: CancellationToken,
    timeout: Duration,
}

impl Deadline {
    /// New deadline from a request signal and timeout
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self { cancel, timeout }
    }

    /// The request signal this deadline races against
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run a capability call under this deadline
    pub async fn run<T, F>(&self, what: &str, fut: F) -> GatewayResult<T>
    where
        F: std::future::Future<Output = GatewayResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(GatewayError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, fut) => match outcome {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout(format!(
                    "{what} exceeded {}ms",
                    self.timeout.as_millis()
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_times_out_slow_calls() {
        let deadline = Deadline::new(CancellationToken::new(), Duration::from_millis(10));
        let err = deadline
            .run("block fetch", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)));
        assert!(err.to_string().starts_with("TimeoutError:"));
    }

    #[tokio::test]
    async fn deadline_propagates_cancellation() {
        let cancel = CancellationToken::new();
        let deadline = Deadline::new(cancel.clone(), Duration::from_secs(30));
        cancel.cancel();
        let err = deadline
            .run("stat", async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Cancelled));
    }

    #[tokio::test]
    async fn deadline_passes_results_through() {
        let deadline = Deadline::new(CancellationToken::new(), Duration::from_secs(1));
        let value = deadline.run("stat", async { Ok(7u64) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
