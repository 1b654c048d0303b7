// Copyright (c) 2025 - Cowboy AI, LLC.

//! `name://` scheme handlers
//!
//! The reserved host carries the key lifecycle (`?key=` GET/POST/DELETE and
//! a bare key listing). Any other host is a mutable name: reads resolve the
//! record and serve the underlying content; POST publishes a URL carried in
//! the body; PUT and DELETE run a copy-on-write tree mutation against the
//! current root and publish the new one.

use http::StatusCode;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::cid as cid_util;
use crate::errors::{GatewayError, GatewayResult};
use crate::multipart;
use crate::naming;
use crate::request::{Request, Response};
use crate::router::Gateway;
use crate::serve;
use crate::tree::{self, TreeOp};
use crate::url::CanUrl;

pub(crate) async fn get(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    if url.is_local() {
        return local_get(gw, url, &req.cancel).await;
    }
    let path = resolved_path(gw, url, &req.cancel).await?;
    let ctx = gw.serve_ctx(&req.cancel);
    serve::serve_path(&ctx, url, &req.headers, &path, false).await
}

pub(crate) async fn head(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    if url.is_local() {
        // Admin lookups answer HEAD with the GET headers and no body
        let response = local_get(gw, url, &req.cancel).await?;
        return Ok(Response {
            status: response.status,
            headers: response.headers,
            body: crate::request::Body::Empty,
        });
    }
    let path = resolved_path(gw, url, &req.cancel).await?;
    let ctx = gw.serve_ctx(&req.cancel);
    serve::head_path(&ctx, url, &req.headers, &path).await
}

/// POST `name://local/?key=A` creates a key; POST `name://<key>/` publishes
/// the URL carried in the body under that key.
pub(crate) async fn post(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    let deadline = gw.name_deadline(&req.cancel);
    if url.is_local() {
        let alias = url
            .query("key")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GatewayError::InvalidInput("key creation needs ?key=<alias>".into()))?;
        let key = naming::ensure_key(gw.client(), &deadline, alias).await?;
        return Ok(Response::created(&naming::name_url(&key)?));
    }

    let body = req.body.into_bytes(&req.cancel).await?;
    let target = std::str::from_utf8(&body)
        .map_err(|_| GatewayError::InvalidInput("publish target must be UTF-8".into()))?;
    let can_path = naming::normalize_target(target)?;
    let key = naming::publish(gw.client(), &deadline, url.host(), &can_path).await?;
    Ok(Response::created(&naming::name_url(&key)?))
}

/// PUT `name://<key>/<path>`: copy-on-write write, then publish the new root
pub(crate) async fn put(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    if url.is_local() {
        return Err(GatewayError::Unsupported);
    }
    let cancel = req.cancel.clone();
    let name_deadline = gw.name_deadline(&cancel);
    let key = naming::has_key(gw.client(), &name_deadline, url.host())
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("no key matches {}", url.host())))?;

    let content_type = req.header("content-type").unwrap_or("").to_string();
    let body = req.body.into_bytes(&cancel).await?;
    let (op, keep_slash) = match multipart::boundary(&content_type) {
        Some(boundary) => (TreeOp::WriteForm(multipart::parse(&body, &boundary)?), true),
        None => (TreeOp::WriteOne(body), false),
    };

    let new_root = mutate_under_key(gw, &cancel, url, &key.name, op).await?;
    publish_root(gw, &cancel, &key.name, &new_root).await?;

    let id = cid_util::to_base36(&key.id)?;
    let trimmed = url.encoded_path();
    let trimmed = trimmed.trim_matches('/');
    let location = match (trimmed.is_empty(), keep_slash) {
        (true, _) => format!("name://{id}/"),
        (false, true) => format!("name://{id}/{trimmed}/"),
        (false, false) => format!("name://{id}/{trimmed}"),
    };
    Ok(Response::created(&location))
}

/// DELETE `name://local/?key=A` removes a key; DELETE `name://<key>/<path>`
/// removes a sub-path and publishes the new root.
pub(crate) async fn delete(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    let deadline = gw.name_deadline(&req.cancel);
    if url.is_local() {
        let alias = url
            .query("key")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GatewayError::InvalidInput("key removal needs ?key=<alias>".into()))?;
        let removed = deadline
            .run("key removal", gw.client().key_remove(alias))
            .await?;
        return match removed {
            Some(_) => Ok(Response::new(StatusCode::OK)),
            None => Err(GatewayError::NotFound(format!("no key named {alias}"))),
        };
    }

    let key = naming::has_key(gw.client(), &deadline, url.host())
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("no key matches {}", url.host())))?;
    let new_root = mutate_under_key(gw, &req.cancel, url, &key.name, TreeOp::Delete).await?;
    publish_root(gw, &req.cancel, &key.name, &new_root).await?;
    let location = format!("name://{}/", cid_util::to_base36(&key.id)?);
    Ok(Response::new(StatusCode::OK).with_header_value("location", &location))
}

async fn local_get(
    gw: &Gateway,
    url: &CanUrl,
    cancel: &CancellationToken,
) -> GatewayResult<Response> {
    let deadline = gw.name_deadline(cancel);
    match url.query("key").filter(|v| !v.is_empty()) {
        Some(token) => match naming::has_key(gw.client(), &deadline, token).await? {
            Some(key) => Ok(Response::found(&naming::name_url(&key)?)),
            None => Err(GatewayError::NotFound(format!("no key named {token}"))),
        },
        None => {
            let keys = deadline.run("key listing", gw.client().key_list()).await?;
            let listing: Vec<_> = keys
                .iter()
                .map(|key| {
                    Ok(json!({
                        "name": key.name,
                        "id": cid_util::to_base36(&key.id)?,
                    }))
                })
                .collect::<GatewayResult<_>>()?;
            Ok(Response::ok(serde_json::to_string(&listing)?)
                .with_content_type("application/json"))
        }
    }
}

/// Resolve a name host and append the request path
async fn resolved_path(
    gw: &Gateway,
    url: &CanUrl,
    cancel: &CancellationToken,
) -> GatewayResult<String> {
    let deadline = gw.name_deadline(cancel);
    let root = naming::resolve_root(gw.client(), &deadline, url.host()).await?;
    let root = root.trim_end_matches('/');
    let rest = url.encoded_path();
    Ok(if rest.is_empty() {
        root.to_string()
    } else {
        format!("{root}/{rest}")
    })
}

/// Apply a tree mutation against the key's current root (fresh keys and
/// unresolvable names start from an empty base; a record pointing anywhere
/// but a content root is refused rather than overwritten)
async fn mutate_under_key(
    gw: &Gateway,
    cancel: &CancellationToken,
    url: &CanUrl,
    alias: &str,
    op: TreeOp,
) -> GatewayResult<cid::Cid> {
    let name_deadline = gw.name_deadline(cancel);
    let old_root = match naming::resolve_root(gw.client(), &name_deadline, alias).await {
        Ok(path) => match naming::root_cid(&path) {
            Some(root) => Some(root),
            None => {
                return Err(GatewayError::InvalidInput(format!(
                    "{alias} resolves to {path}, not a content root"
                )))
            }
        },
        Err(err) if err.is_not_found() => None,
        Err(err) => return Err(err),
    };
    let deadline = gw.short_deadline(cancel);
    tree::apply(
        gw.client(),
        &deadline,
        old_root.as_ref(),
        &url.encoded_path(),
        op,
    )
    .await
}

/// Publish the new root; a failure here leaves the content written but the
/// record untouched, which surfaces as an internal error carrying the cause
async fn publish_root(
    gw: &Gateway,
    cancel: &CancellationToken,
    alias: &str,
    new_root: &cid::Cid,
) -> GatewayResult<()> {
    let deadline = gw.name_deadline(cancel);
    let can_path = format!("/content/{}/", cid_util::to_base32(new_root)?);
    deadline
        .run(
            "record publish",
            gw.client().name_publish(alias, &can_path, true),
        )
        .await
        .map_err(|err| GatewayError::Internal(format!("publish failed after write: {err}")))
}
