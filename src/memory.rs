// Copyright (c) 2025 - Cowboy AI, LLC.

//! In-memory CAN client for testing
//!
//! A self-contained implementation of the full capability surface backed by
//! process memory: a structural content tree hashed with the crate's CID
//! discipline, a mutable scratch root, a key set with published records, a
//! linked-data node store, and broadcast-based pubsub topics. Integration
//! tests and demos drive the gateway against this client; it is not a
//! network node.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use futures::stream::StreamExt;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::cid::{codec, for_content, parse, to_base36, to_v1, EMPTY_DIR_CID};
use crate::client::{
    BusMessage, BusStream, CanClient, DirEntry, EntryKind, EntryStat, KeyInfo, WriteOptions,
};
use crate::errors::{GatewayError, GatewayResult};
use crate::request::ByteStream;

/// One node of the structural content tree
#[derive(Debug, Clone)]
enum Node {
    File(Bytes),
    Dir(BTreeMap<String, Node>),
}

impl Node {
    fn cid(&self) -> Cid {
        match self {
            Node::File(bytes) => for_content(codec::RAW, bytes),
            Node::Dir(children) => {
                let manifest: BTreeMap<&str, String> = children
                    .iter()
                    .map(|(name, child)| (name.as_str(), child.cid().to_string()))
                    .collect();
                let bytes = serde_json::to_vec(&manifest).expect("manifest serializes");
                for_content(codec::DAG_PB, &bytes)
            }
        }
    }

    fn block_bytes(&self) -> Bytes {
        match self {
            Node::File(bytes) => bytes.clone(),
            Node::Dir(children) => {
                let manifest: BTreeMap<&str, String> = children
                    .iter()
                    .map(|(name, child)| (name.as_str(), child.cid().to_string()))
                    .collect();
                Bytes::from(serde_json::to_vec(&manifest).expect("manifest serializes"))
            }
        }
    }

    fn kind(&self) -> EntryKind {
        match self {
            Node::File(_) => EntryKind::File,
            Node::Dir(_) => EntryKind::Directory,
        }
    }

    fn size(&self) -> u64 {
        match self {
            Node::File(bytes) => bytes.len() as u64,
            Node::Dir(_) => 0,
        }
    }
}

#[derive(Default)]
struct State {
    /// Registered immutable nodes, addressable as content roots
    roots: HashMap<Cid, Node>,
    /// Raw linked-data blocks by identifier
    blocks: HashMap<Cid, Bytes>,
    /// Mutable scratch tree (paths outside `/content` and `/name`)
    files: BTreeMap<String, Node>,
    /// Key set in creation order: alias → public key id
    keys: IndexMap<String, Cid>,
    /// Published records: base36 key id → CAN-path
    records: HashMap<String, String>,
    /// DNS-style links: hostname → CAN-path
    dns: HashMap<String, String>,
    /// Decoded linked-data nodes
    dags: HashMap<Cid, Value>,
    /// Topics with local membership
    subscribed: HashSet<String>,
    /// Live topic channels
    topics: HashMap<String, broadcast::Sender<BusMessage>>,
}

/// In-memory CAN client
pub struct MemoryClient {
    peer: String,
    state: Arc<RwLock<State>>,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    /// Create a client with the empty-directory sentinel pre-registered
    pub fn new() -> Self {
        let mut state = State::default();
        if let Ok(empty) = parse(EMPTY_DIR_CID) {
            state.roots.insert(empty, Node::Dir(BTreeMap::new()));
            state.roots.insert(to_v1(&empty), Node::Dir(BTreeMap::new()));
        }
        Self {
            peer: format!("peer-{}", Uuid::new_v4().simple()),
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Point a DNS-style hostname at a CAN-path (test convenience)
    pub async fn set_dns_link(&self, host: &str, path: &str) {
        self.state
            .write()
            .await
            .dns
            .insert(host.to_string(), path.to_string());
    }

    fn register(state: &mut State, node: &Node) {
        state.roots.insert(node.cid(), node.clone());
        if let Node::Dir(children) = node {
            for child in children.values() {
                Self::register(state, child);
            }
        }
    }

    fn resolve<'a>(state: &'a State, path: &str) -> GatewayResult<&'a Node> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (mut node, rest) = match segments.first() {
            Some(&"content") => {
                let root = segments
                    .get(1)
                    .ok_or_else(|| GatewayError::InvalidInput("missing content root".into()))?;
                let cid = parse(root)?;
                let node = state
                    .roots
                    .get(&cid)
                    .or_else(|| state.roots.get(&to_v1(&cid)))
                    .ok_or_else(|| GatewayError::NotFound(format!("unknown root {root}")))?;
                (node, &segments[2..])
            }
            Some(&"name") => {
                let key = segments
                    .get(1)
                    .ok_or_else(|| GatewayError::InvalidInput("missing name root".into()))?;
                let target = state
                    .records
                    .get(*key)
                    .ok_or_else(|| GatewayError::NotFound(format!("no record for {key}")))?;
                let node = Self::resolve(state, target)?;
                (node, &segments[2..])
            }
            _ => {
                // Scratch tree path
                let root = segments
                    .first()
                    .ok_or_else(|| GatewayError::NotFound("empty path".into()))?;
                let node = state
                    .files
                    .get(*root)
                    .ok_or_else(|| GatewayError::NotFound(format!("no scratch entry {root}")))?;
                (node, &segments[1..])
            }
        };
        for step in rest {
            node = match node {
                Node::Dir(children) => children
                    .get(*step)
                    .ok_or_else(|| GatewayError::NotFound(format!("no entry {step}")))?,
                Node::File(_) => {
                    return Err(GatewayError::NotFound(format!(
                        "cannot descend into file at {step}"
                    )))
                }
            };
        }
        Ok(node)
    }

    /// Navigate a scratch path mutably, creating parent directories
    fn scratch_entry<'a>(
        state: &'a mut State,
        path: &str,
    ) -> GatewayResult<(&'a mut BTreeMap<String, Node>, String)> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| GatewayError::InvalidInput("empty scratch path".into()))?;
        let mut current = &mut state.files;
        for step in parents {
            let entry = current
                .entry(step.to_string())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            current = match entry {
                Node::Dir(children) => children,
                Node::File(_) => {
                    return Err(GatewayError::InvalidInput(format!(
                        "scratch path crosses a file at {step}"
                    )))
                }
            };
        }
        Ok((current, leaf.to_string()))
    }

    fn is_scratch(path: &str) -> bool {
        !path.starts_with("/content/") && !path.starts_with("/name/")
    }
}

#[async_trait]
impl CanClient for MemoryClient {
    async fn stat(&self, path: &str) -> GatewayResult<EntryStat> {
        let mut state = self.state.write().await;
        let node = Self::resolve(&state, path)?.clone();
        // Make the resolved tree addressable as a content root
        Self::register(&mut state, &node);
        Ok(EntryStat {
            cid: node.cid(),
            kind: node.kind(),
            size: node.size(),
        })
    }

    async fn cat(
        &self,
        path: &str,
        offset: Option<u64>,
        length: Option<u64>,
    ) -> GatewayResult<ByteStream> {
        let state = self.state.read().await;
        let node = Self::resolve(&state, path)?;
        let bytes = match node {
            Node::File(bytes) => bytes.clone(),
            Node::Dir(_) => {
                return Err(GatewayError::InvalidInput(format!(
                    "cannot cat a directory: {path}"
                )))
            }
        };
        let start = offset.unwrap_or(0).min(bytes.len() as u64) as usize;
        let end = match length {
            Some(len) => (start + len as usize).min(bytes.len()),
            None => bytes.len(),
        };
        let slice = bytes.slice(start..end);
        Ok(futures::stream::once(async move { Ok(slice) }).boxed())
    }

    async fn ls(&self, path: &str) -> GatewayResult<Vec<DirEntry>> {
        let state = self.state.read().await;
        match Self::resolve(&state, path)? {
            Node::Dir(children) => Ok(children
                .iter()
                .map(|(name, child)| DirEntry {
                    name: name.clone(),
                    kind: child.kind(),
                    size: child.size(),
                })
                .collect()),
            Node::File(_) => Err(GatewayError::InvalidInput(format!(
                "not a directory: {path}"
            ))),
        }
    }

    async fn write(&self, path: &str, data: Bytes, _opts: WriteOptions) -> GatewayResult<()> {
        if !Self::is_scratch(path) {
            return Err(GatewayError::InvalidInput(
                "writes target the mutable scratch tree".into(),
            ));
        }
        let mut state = self.state.write().await;
        let (parent, leaf) = Self::scratch_entry(&mut state, path)?;
        parent.insert(leaf, Node::File(data));
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> GatewayResult<()> {
        if !Self::is_scratch(path) {
            return Err(GatewayError::InvalidInput(
                "mkdir targets the mutable scratch tree".into(),
            ));
        }
        let mut state = self.state.write().await;
        let (parent, leaf) = Self::scratch_entry(&mut state, path)?;
        parent
            .entry(leaf)
            .or_insert_with(|| Node::Dir(BTreeMap::new()));
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> GatewayResult<()> {
        if !Self::is_scratch(to) {
            return Err(GatewayError::InvalidInput(
                "copy destination must be a scratch path".into(),
            ));
        }
        let mut state = self.state.write().await;
        let node = Self::resolve(&state, from)?.clone();
        let (parent, leaf) = Self::scratch_entry(&mut state, to)?;
        parent.insert(leaf, node);
        Ok(())
    }

    async fn remove(&self, path: &str, recursive: bool) -> GatewayResult<()> {
        if !Self::is_scratch(path) {
            return Err(GatewayError::InvalidInput(
                "removal targets the mutable scratch tree".into(),
            ));
        }
        let mut state = self.state.write().await;
        let (parent, leaf) = Self::scratch_entry(&mut state, path)?;
        let nonempty_dir = matches!(
            parent.get(&leaf),
            Some(Node::Dir(children)) if !children.is_empty()
        );
        if nonempty_dir && !recursive {
            return Err(GatewayError::InvalidInput(format!(
                "directory not empty: {path}"
            )));
        }
        match parent.remove(&leaf) {
            Some(_) => Ok(()),
            None => Err(GatewayError::NotFound(format!("no entry at {path}"))),
        }
    }

    async fn block_get(&self, cid: &Cid) -> GatewayResult<Bytes> {
        let state = self.state.read().await;
        if let Some(node) = state.roots.get(cid).or_else(|| state.roots.get(&to_v1(cid))) {
            return Ok(node.block_bytes());
        }
        state
            .blocks
            .get(cid)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("no block {cid}")))
    }

    async fn export_car(&self, cid: &Cid) -> GatewayResult<ByteStream> {
        let state = self.state.read().await;
        let root = state
            .roots
            .get(cid)
            .or_else(|| state.roots.get(&to_v1(cid)))
            .ok_or_else(|| GatewayError::NotFound(format!("no root {cid}")))?;

        let mut sections: Vec<(Cid, Bytes)> = Vec::new();
        collect_blocks(root, &mut sections);

        let mut out = Vec::new();
        let header = serde_cbor::to_vec(&serde_json::json!({
            "version": 1,
            "roots": [cid.to_string()],
        }))?;
        push_varint(&mut out, header.len() as u64);
        out.extend_from_slice(&header);
        for (cid, data) in sections {
            let cid_bytes = cid.to_bytes();
            push_varint(&mut out, (cid_bytes.len() + data.len()) as u64);
            out.extend_from_slice(&cid_bytes);
            out.extend_from_slice(&data);
        }
        Ok(futures::stream::once(async move { Ok(Bytes::from(out)) }).boxed())
    }

    async fn import_car(&self, data: Bytes) -> GatewayResult<Vec<Cid>> {
        let mut cursor = 0usize;
        let header_len = read_varint(&data, &mut cursor)? as usize;
        let header: Value = serde_cbor::from_slice(
            data.get(cursor..cursor + header_len)
                .ok_or_else(|| GatewayError::InvalidInput("truncated archive header".into()))?,
        )?;
        cursor += header_len;

        let mut blocks: HashMap<Cid, Bytes> = HashMap::new();
        while cursor < data.len() {
            let section_len = read_varint(&data, &mut cursor)? as usize;
            let section = data
                .get(cursor..cursor + section_len)
                .ok_or_else(|| GatewayError::InvalidInput("truncated archive section".into()))?;
            cursor += section_len;
            let cid = Cid::read_bytes(section)
                .map_err(|e| GatewayError::InvalidInput(format!("bad section cid: {e}")))?;
            let payload = Bytes::copy_from_slice(&section[cid.encoded_len()..]);
            blocks.insert(cid, payload);
        }

        let roots: Vec<Cid> = header
            .get("roots")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|s| s.parse().ok())
                    .collect()
            })
            .unwrap_or_default();
        if roots.is_empty() {
            return Err(GatewayError::InvalidInput("archive carries no roots".into()));
        }

        let mut state = self.state.write().await;
        for root in &roots {
            let node = rebuild_node(root, &blocks)?;
            Self::register(&mut state, &node);
        }
        Ok(roots)
    }

    async fn dag_get(&self, cid: &Cid) -> GatewayResult<Value> {
        let state = self.state.read().await;
        state
            .dags
            .get(cid)
            .or_else(|| state.dags.get(&to_v1(cid)))
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("no linked-data node {cid}")))
    }

    async fn dag_put(&self, value: &Value, codec_code: u64) -> GatewayResult<Cid> {
        let encoded = match codec_code {
            codec::DAG_JSON => Bytes::from(serde_json::to_vec(value)?),
            _ => Bytes::from(serde_cbor::to_vec(value)?),
        };
        let cid = for_content(codec_code, &encoded);
        let mut state = self.state.write().await;
        state.blocks.insert(cid, encoded);
        state.dags.insert(cid, value.clone());
        Ok(cid)
    }

    async fn key_list(&self) -> GatewayResult<Vec<KeyInfo>> {
        let state = self.state.read().await;
        Ok(state
            .keys
            .iter()
            .map(|(name, id)| KeyInfo {
                name: name.clone(),
                id: *id,
            })
            .collect())
    }

    async fn key_gen(&self, alias: &str) -> GatewayResult<KeyInfo> {
        let mut state = self.state.write().await;
        if state.keys.contains_key(alias) {
            return Err(GatewayError::InvalidInput(format!(
                "key already exists: {alias}"
            )));
        }
        let id = for_content(codec::LIBP2P_KEY, Uuid::new_v4().as_bytes());
        state.keys.insert(alias.to_string(), id);
        Ok(KeyInfo {
            name: alias.to_string(),
            id,
        })
    }

    async fn key_remove(&self, alias: &str) -> GatewayResult<Option<KeyInfo>> {
        let mut state = self.state.write().await;
        Ok(state.keys.shift_remove(alias).map(|id| {
            let record = to_base36(&id).ok();
            if let Some(record) = record {
                state.records.remove(&record);
            }
            KeyInfo {
                name: alias.to_string(),
                id,
            }
        }))
    }

    async fn name_publish(&self, alias: &str, path: &str, _offline: bool) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        let id = *state
            .keys
            .get(alias)
            .ok_or_else(|| GatewayError::NotFound(format!("unknown key {alias}")))?;
        let record = to_base36(&id)?;
        state.records.insert(record, path.to_string());
        Ok(())
    }

    async fn name_resolve(&self, name: &str) -> GatewayResult<String> {
        let state = self.state.read().await;
        if name.contains('.') {
            return state
                .dns
                .get(name)
                .cloned()
                .ok_or_else(|| GatewayError::NotFound(format!("no DNS link for {name}")));
        }
        if let Some(path) = state.records.get(name) {
            return Ok(path.clone());
        }
        // Alias convenience for direct client use
        if let Some(id) = state.keys.get(name) {
            if let Some(path) = state.records.get(&to_base36(id)?) {
                return Ok(path.clone());
            }
        }
        Err(GatewayError::NotFound(format!("no record for {name}")))
    }

    async fn peer_id(&self) -> GatewayResult<String> {
        Ok(self.peer.clone())
    }

    async fn subscribe(&self, topic: &str) -> GatewayResult<BusStream> {
        let mut state = self.state.write().await;
        let sender = state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(64).0);
        let receiver = sender.subscribe();
        state.subscribed.insert(topic.to_string());
        // Lagged receivers skip ahead rather than erroring the stream
        Ok(BroadcastStream::new(receiver)
            .filter_map(|item| async move { item.ok().map(Ok) })
            .boxed())
    }

    async fn unsubscribe(&self, topic: &str) -> GatewayResult<()> {
        self.state.write().await.subscribed.remove(topic);
        Ok(())
    }

    async fn publish(&self, topic: &str, data: Bytes) -> GatewayResult<()> {
        let mut state = self.state.write().await;
        let sender = state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(64).0);
        let _ = sender.send(BusMessage {
            from: self.peer.clone(),
            data,
        });
        Ok(())
    }

    async fn subscriptions(&self) -> GatewayResult<Vec<String>> {
        let state = self.state.read().await;
        let mut topics: Vec<String> = state.subscribed.iter().cloned().collect();
        topics.sort();
        Ok(topics)
    }
}

fn collect_blocks(node: &Node, out: &mut Vec<(Cid, Bytes)>) {
    out.push((node.cid(), node.block_bytes()));
    if let Node::Dir(children) = node {
        for child in children.values() {
            collect_blocks(child, out);
        }
    }
}

fn rebuild_node(cid: &Cid, blocks: &HashMap<Cid, Bytes>) -> GatewayResult<Node> {
    let bytes = blocks
        .get(cid)
        .ok_or_else(|| GatewayError::InvalidInput(format!("archive missing block {cid}")))?;
    if cid.codec() == codec::DAG_PB {
        let manifest: BTreeMap<String, String> = serde_json::from_slice(bytes)
            .map_err(|_| GatewayError::InvalidInput(format!("malformed directory block {cid}")))?;
        let mut children = BTreeMap::new();
        for (name, child_cid) in manifest {
            let child_cid: Cid = child_cid
                .parse()
                .map_err(|e| GatewayError::InvalidInput(format!("bad child cid: {e}")))?;
            children.insert(name, rebuild_node(&child_cid, blocks)?);
        }
        Ok(Node::Dir(children))
    } else {
        Ok(Node::File(bytes.clone()))
    }
}

fn push_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn read_varint(data: &[u8], cursor: &mut usize) -> GatewayResult<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *data
            .get(*cursor)
            .ok_or_else(|| GatewayError::InvalidInput("truncated varint".into()))?;
        *cursor += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(GatewayError::InvalidInput("varint overflow".into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scratch_write_then_content_read() {
        let client = MemoryClient::new();
        client
            .write("/gateway-tmp/a/file.txt", Bytes::from_static(b"hi"), WriteOptions::default())
            .await
            .unwrap();
        let stat = client.stat("/gateway-tmp/a").await.unwrap();
        assert_eq!(stat.kind, EntryKind::Directory);

        let path = format!("/content/{}/file.txt", stat.cid);
        let stat = client.stat(&path).await.unwrap();
        assert_eq!(stat.size, 2);
        let mut stream = client.cat(&path, None, None).await.unwrap();
        assert_eq!(&stream.next().await.unwrap().unwrap()[..], b"hi");
    }

    #[tokio::test]
    async fn empty_dir_sentinel_is_preloaded() {
        let client = MemoryClient::new();
        let stat = client
            .stat(&format!("/content/{EMPTY_DIR_CID}"))
            .await
            .unwrap();
        assert_eq!(stat.kind, EntryKind::Directory);
        assert!(client
            .ls(&format!("/content/{EMPTY_DIR_CID}"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn archive_round_trip_restores_the_tree() {
        let client = MemoryClient::new();
        client
            .write("/gateway-tmp/t/a.txt", Bytes::from_static(b"a"), WriteOptions::default())
            .await
            .unwrap();
        client
            .write("/gateway-tmp/t/sub/b.txt", Bytes::from_static(b"b"), WriteOptions::default())
            .await
            .unwrap();
        let root = client.stat("/gateway-tmp/t").await.unwrap().cid;

        let mut stream = client.export_car(&root).await.unwrap();
        let archive = stream.next().await.unwrap().unwrap();

        let fresh = MemoryClient::new();
        let roots = fresh.import_car(archive).await.unwrap();
        assert_eq!(roots, vec![root]);
        let names: Vec<String> = fresh
            .ls(&format!("/content/{root}"))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["a.txt", "sub"]);
    }

    #[tokio::test]
    async fn pubsub_delivers_to_subscribers() {
        let client = MemoryClient::new();
        let mut sub = client.subscribe("news").await.unwrap();
        client
            .publish("news", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        let msg = sub.next().await.unwrap().unwrap();
        assert_eq!(&msg.data[..], b"hello");
        assert_eq!(client.subscriptions().await.unwrap(), ["news"]);
        client.unsubscribe("news").await.unwrap();
        assert!(client.subscriptions().await.unwrap().is_empty());
    }
}
