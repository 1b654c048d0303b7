// Copyright (c) 2025 - Cowboy AI, LLC.

//! Linked-data graph operations
//!
//! Typed values over the DAG: codec selection between deterministic JSON and
//! CBOR, URL-path traversal into a resolved value, and JSON-Patch application
//! producing a new root. The codec libraries themselves are collaborators
//! (`serde_cbor`, `serde_json`); this module owns the semantics.

use serde_json::Value;

use crate::cid::codec;
use crate::errors::{GatewayError, GatewayResult};
use crate::negotiate::ResponseFormat;
use crate::url::CanUrl;

/// Decode a request body into a typed value according to its content type
pub fn decode_body(content_type: &str, bytes: &[u8]) -> GatewayResult<Value> {
    let media = content_type.split(';').next().unwrap_or("").trim();
    match media {
        "application/json" | "application/vnd.ipld.dag-json" | "text/json" => {
            Ok(serde_json::from_slice(bytes)?)
        }
        "application/cbor" | "application/vnd.ipld.dag-cbor" => Ok(serde_cbor::from_slice(bytes)?),
        other => Err(GatewayError::InvalidInput(format!(
            "unsupported content type for linked data: {other}"
        ))),
    }
}

/// Encode a resolved value for the negotiated response format.
///
/// Returns the payload and its content type. The default shape is
/// deterministic JSON.
pub fn encode_value(value: &Value, format: ResponseFormat) -> GatewayResult<(Vec<u8>, &'static str)> {
    match format {
        ResponseFormat::DagCbor => Ok((
            serde_cbor::to_vec(value)?,
            "application/vnd.ipld.dag-cbor",
        )),
        ResponseFormat::Default | ResponseFormat::DagJson => {
            Ok((serde_json::to_vec(value)?, "application/json"))
        }
        _ => Err(GatewayError::InvalidInput(
            "unsupported format for linked data".into(),
        )),
    }
}

/// Store codec selected by `?format=`; linked-data nodes default to dag-cbor
pub fn store_codec(url: &CanUrl) -> GatewayResult<u64> {
    match url.query("format").filter(|v| !v.is_empty()) {
        None => Ok(codec::DAG_CBOR),
        Some("dag-cbor") | Some("cbor") => Ok(codec::DAG_CBOR),
        Some("dag-json") | Some("json") => Ok(codec::DAG_JSON),
        Some(other) => Err(GatewayError::InvalidInput(format!(
            "unrecognized store codec: {other}"
        ))),
    }
}

/// Walk URL path segments into a resolved value.
///
/// Segment parameters after `;` are stripped; array segments index by
/// position. A missing step is a not-found outcome.
pub fn traverse<'a>(value: &'a Value, segments: &[String]) -> GatewayResult<&'a Value> {
    let mut current = value;
    for raw in segments {
        let step = strip_params(raw);
        if step.is_empty() {
            continue;
        }
        current = match current {
            Value::Object(map) => map
                .get(step)
                .ok_or_else(|| GatewayError::NotFound(format!("no such field: {step}")))?,
            Value::Array(items) => {
                let index: usize = step.parse().map_err(|_| {
                    GatewayError::NotFound(format!("array step is not an index: {step}"))
                })?;
                items
                    .get(index)
                    .ok_or_else(|| GatewayError::NotFound(format!("index out of bounds: {index}")))?
            }
            _ => {
                return Err(GatewayError::NotFound(format!(
                    "cannot descend into scalar at {step}"
                )))
            }
        };
    }
    Ok(current)
}

/// Apply a JSON-Patch document to the subtree addressed by the URL segments,
/// returning the mutated root value
pub fn apply_patch(root: Value, segments: &[String], patch_doc: &[u8]) -> GatewayResult<Value> {
    let patch: json_patch::Patch = serde_json::from_slice(patch_doc)?;
    let mut root = root;

    let target = traverse_mut(&mut root, segments)?;
    json_patch::patch(target, &patch)
        .map_err(|e| GatewayError::InvalidInput(format!("patch failed: {e}")))?;
    Ok(root)
}

fn traverse_mut<'a>(value: &'a mut Value, segments: &[String]) -> GatewayResult<&'a mut Value> {
    let mut current = value;
    for raw in segments {
        let step = strip_params(raw);
        if step.is_empty() {
            continue;
        }
        current = match current {
            Value::Object(map) => map
                .get_mut(step)
                .ok_or_else(|| GatewayError::NotFound(format!("no such field: {step}")))?,
            Value::Array(items) => {
                let index: usize = step.parse().map_err(|_| {
                    GatewayError::NotFound(format!("array step is not an index: {step}"))
                })?;
                items
                    .get_mut(index)
                    .ok_or_else(|| GatewayError::NotFound(format!("index out of bounds: {index}")))?
            }
            _ => {
                return Err(GatewayError::NotFound(format!(
                    "cannot descend into scalar at {step}"
                )))
            }
        };
    }
    Ok(current)
}

fn strip_params(segment: &str) -> &str {
    segment.split(';').next().unwrap_or("")
}
