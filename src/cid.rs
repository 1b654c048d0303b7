// Copyright (c) 2025 - Cowboy AI, LLC.

//! Content identifier helpers
//!
//! The gateway only ever emits version-1 CIDs: base32 for content roots and
//! base36 for mutable-name public keys. This module holds the normalization
//! helpers, the multicodec constants the adapter speaks, and the well-known
//! empty-directory sentinel callers may use as a write base.

use multibase::Base;
use multihash::Multihash;

use crate::errors::{GatewayError, GatewayResult};

// Re-export the underlying CID type
pub use cid::Cid;

/// Multicodec table entries used by the gateway (from the multicodec registry)
pub mod codec {
    /// Raw binary block
    pub const RAW: u64 = 0x55;
    /// MerkleDAG protobuf (directory and file nodes)
    pub const DAG_PB: u64 = 0x70;
    /// MerkleDAG CBOR
    pub const DAG_CBOR: u64 = 0x71;
    /// MerkleDAG JSON
    pub const DAG_JSON: u64 = 0x0129;
    /// Libp2p public key (mutable-name key identifiers)
    pub const LIBP2P_KEY: u64 = 0x72;
}

/// Multihash code for BLAKE3
const BLAKE3: u64 = 0x1e;

/// Well-known inline encoding of an empty directory, usable as a write base
pub const EMPTY_DIR_CID: &str = "bafyaabakaieac";

/// Parse a CID from its text form
pub fn parse(s: &str) -> GatewayResult<Cid> {
    s.parse::<Cid>()
        .map_err(|e| GatewayError::InvalidInput(format!("invalid CID {s}: {e}")))
}

/// True when the token parses as a CID
pub fn is_cid(s: &str) -> bool {
    s.parse::<Cid>().is_ok()
}

/// Normalize any CID to version 1, keeping its codec and hash
pub fn to_v1(cid: &Cid) -> Cid {
    match cid.version() {
        cid::Version::V1 => *cid,
        _ => Cid::new_v1(codec::DAG_PB, *cid.hash()),
    }
}

/// Version-1 base32 text form, the stable encoding for content roots
pub fn to_base32(cid: &Cid) -> GatewayResult<String> {
    to_v1(cid)
        .to_string_of_base(Base::Base32Lower)
        .map_err(GatewayError::from)
}

/// Version-1 base36 text form, the stable encoding for key identifiers
pub fn to_base36(cid: &Cid) -> GatewayResult<String> {
    to_v1(cid)
        .to_string_of_base(Base::Base36Lower)
        .map_err(GatewayError::from)
}

/// Derive a CID for a payload under the given multicodec.
///
/// Hashing uses BLAKE3 wrapped in a multihash, the same discipline the rest
/// of the CIM stack applies to content addressing.
pub fn for_content(codec: u64, bytes: &[u8]) -> Cid {
    let hash = blake3::hash(bytes);
    let mh =
        Multihash::wrap(BLAKE3, hash.as_bytes()).expect("BLAKE3 digest fits a 64-byte multihash");
    Cid::new_v1(codec, mh)
}
