// Copyright (c) 2025 - Cowboy AI, LLC.

//! `linked://` scheme handlers
//!
//! Typed values over the DAG. GET resolves a URL path into the decoded
//! value and encodes it per negotiation; POST against the reserved host
//! stores a new node from the request body; PATCH applies a JSON-Patch
//! document and answers with the new root.

use crate::cid as cid_util;
use crate::errors::{GatewayError, GatewayResult};
use crate::linked;
use crate::negotiate::{negotiate, ResponseFormat};
use crate::request::{Request, Response};
use crate::router::Gateway;
use crate::url::CanUrl;

pub(crate) async fn get(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    if url.is_local() {
        return Err(GatewayError::NotFound(
            "local is not a linked-data root".into(),
        ));
    }
    let root = cid_util::parse(url.host())?;
    let deadline = gw.short_deadline(&req.cancel);

    match negotiate(url, &req.headers)? {
        ResponseFormat::Raw => {
            let block = deadline
                .run("block fetch", gw.client().block_get(&root))
                .await?;
            Ok(Response::ok(block).with_content_type("application/vnd.ipld.raw"))
        }
        ResponseFormat::Car => {
            let stream = deadline
                .run("archive export", gw.client().export_car(&root))
                .await?;
            Ok(Response::ok(crate::request::Body::Stream(
                crate::request::until_cancelled(stream, req.cancel.clone()),
            ))
            .with_content_type("application/vnd.ipld.car"))
        }
        format => {
            let value = deadline
                .run("node resolve", gw.client().dag_get(&root))
                .await?;
            let resolved = linked::traverse(&value, url.segments())?;
            let (payload, content_type) = linked::encode_value(resolved, format)?;
            Ok(Response::ok(payload).with_content_type(content_type))
        }
    }
}

/// POST `linked://local/`: create a node from the request body
pub(crate) async fn post(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    if !url.is_local() {
        return Err(GatewayError::Unsupported);
    }
    let content_type = req
        .header("content-type")
        .ok_or_else(|| {
            GatewayError::InvalidInput("node creation needs a Content-Type".into())
        })?
        .to_string();
    let codec = linked::store_codec(url)?;
    let body = req.body.into_bytes(&req.cancel).await?;
    let value = linked::decode_body(&content_type, &body)?;

    let deadline = gw.short_deadline(&req.cancel);
    let cid = deadline
        .run("node store", gw.client().dag_put(&value, codec))
        .await?;
    let location = format!("linked://{}/", cid_util::to_base32(&cid)?);
    Ok(Response::created(&location))
}

/// PATCH `linked://<cid>/<path>`: apply a JSON-Patch document, producing a
/// new root under the same store codec as the old one
pub(crate) async fn patch(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    if url.is_local() {
        return Err(GatewayError::Unsupported);
    }
    let root = cid_util::parse(url.host())?;
    let body = req.body.into_bytes(&req.cancel).await?;

    let deadline = gw.short_deadline(&req.cancel);
    let value = deadline
        .run("node resolve", gw.client().dag_get(&root))
        .await?;
    let patched = linked::apply_patch(value, url.segments(), &body)?;

    let codec = match root.codec() {
        code if code == cid_util::codec::DAG_JSON => cid_util::codec::DAG_JSON,
        _ => cid_util::codec::DAG_CBOR,
    };
    let new_root = deadline
        .run("node store", gw.client().dag_put(&patched, codec))
        .await?;
    let location = format!("linked://{}/", cid_util::to_base32(&new_root)?);
    Ok(Response::created(&location))
}
