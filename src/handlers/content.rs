// Copyright (c) 2025 - Cowboy AI, LLC.

//! `content://` scheme handlers
//!
//! Reads resolve the host CID through the export capability and stream the
//! result. Writes are copy-on-write: PUT against any root yields a new root
//! URL, POST against the reserved host uploads into a fresh root (form,
//! single body, or CAR archive import), DELETE removes a sub-path.

use http::StatusCode;

use crate::errors::{GatewayError, GatewayResult};
use crate::multipart;
use crate::request::{Request, Response};
use crate::router::Gateway;
use crate::serve;
use crate::tree::{self, TreeOp};
use crate::url::CanUrl;
use crate::cid as cid_util;

pub(crate) async fn get(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    if url.is_local() {
        return Err(GatewayError::NotFound(
            "local is not a content root".into(),
        ));
    }
    let ctx = gw.serve_ctx(&req.cancel);
    serve::serve_path(&ctx, url, &req.headers, &url.can_path(), false).await
}

pub(crate) async fn head(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    if url.is_local() {
        return Err(GatewayError::NotFound(
            "local is not a content root".into(),
        ));
    }
    let ctx = gw.serve_ctx(&req.cancel);
    serve::head_path(&ctx, url, &req.headers, &url.can_path()).await
}

/// POST `content://local/…`: upload into a fresh root
pub(crate) async fn post(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    if !url.is_local() {
        return Err(GatewayError::Unsupported);
    }
    let deadline = gw.short_deadline(&req.cancel);
    let content_type = req.header("content-type").unwrap_or("").to_string();
    let body = req.body.into_bytes(&req.cancel).await?;

    if content_type.split(';').next().unwrap_or("").trim() == "application/vnd.ipld.car" {
        let roots = deadline
            .run("archive import", gw.client().import_car(body))
            .await?;
        let root = roots
            .first()
            .ok_or_else(|| GatewayError::InvalidInput("archive carries no roots".into()))?;
        let location = format!("content://{}/", cid_util::to_base32(root)?);
        return Ok(Response::created(&location));
    }

    if let Some(boundary) = multipart::boundary(&content_type) {
        let parts = multipart::parse(&body, &boundary)?;
        let new_root = tree::apply(
            gw.client(),
            &deadline,
            None,
            &url.encoded_path(),
            TreeOp::WriteForm(parts),
        )
        .await?;
        let location = tree::result_url(&new_root, &url.encoded_path(), true)?;
        return Ok(Response::created(&location));
    }

    // Single-body upload: the path (or `?filename=`) names the file
    let rel = if url.segments().is_empty() {
        url.query("filename")
            .filter(|v| !v.is_empty())
            .map(crate::url::encode_segment)
            .ok_or_else(|| {
                GatewayError::InvalidInput("uploads need a path or ?filename".into())
            })?
    } else {
        url.encoded_path()
    };
    let new_root = tree::apply(gw.client(), &deadline, None, &rel, TreeOp::WriteOne(body)).await?;
    let location = tree::result_url(&new_root, &rel, false)?;
    Ok(Response::created(&location))
}

/// PUT `content://<cid>/<path>`: copy-on-write file or form write
pub(crate) async fn put(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    if url.is_local() {
        // Reserved-host uploads go through POST
        return Err(GatewayError::Unsupported);
    }
    let old_root = cid_util::parse(url.host())?;
    let deadline = gw.short_deadline(&req.cancel);
    let content_type = req.header("content-type").unwrap_or("").to_string();
    let body = req.body.into_bytes(&req.cancel).await?;

    let (op, keep_slash) = match multipart::boundary(&content_type) {
        Some(boundary) => (TreeOp::WriteForm(multipart::parse(&body, &boundary)?), true),
        None => (TreeOp::WriteOne(body), false),
    };
    let new_root = tree::apply(
        gw.client(),
        &deadline,
        Some(&old_root),
        &url.encoded_path(),
        op,
    )
    .await?;
    let location = tree::result_url(&new_root, &url.encoded_path(), keep_slash)?;
    Ok(Response::created(&location))
}

/// DELETE `content://<cid>/<path>`: copy-on-write removal of a sub-path
pub(crate) async fn delete(gw: &Gateway, url: &CanUrl, req: Request) -> GatewayResult<Response> {
    if url.is_local() {
        return Err(GatewayError::Unsupported);
    }
    let old_root = cid_util::parse(url.host())?;
    let deadline = gw.short_deadline(&req.cancel);
    let new_root = tree::apply(
        gw.client(),
        &deadline,
        Some(&old_root),
        &url.encoded_path(),
        TreeOp::Delete,
    )
    .await?;
    let location = tree::result_url(&new_root, "", true)?;
    Ok(Response::new(StatusCode::OK).with_header_value("location", &location))
}
