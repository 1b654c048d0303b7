// Copyright (c) 2025 - Cowboy AI, LLC.

//! Stat/export serving
//!
//! Resolution of a CAN-path into a streamed response: file bytes with range
//! support, directory listings as JSON or rendered HTML, `index.html`
//! resolution, and HEAD mirrors of all of the above. Used by the content
//! scheme directly and by the naming scheme after resolution.

use http::header::HeaderMap;
use http::StatusCode;

use crate::client::{CanClient, Deadline, DirEntry, EntryKind, EntryStat};
use crate::errors::{GatewayError, GatewayResult};
use crate::negotiate::{negotiate, ResponseFormat};
use crate::range;
use crate::request::{until_cancelled, Body, Response};
use crate::router::IndexRenderer;
use crate::url::CanUrl;

/// Serving context: the client plus the read deadline and renderer hook
pub(crate) struct ServeCtx<'a> {
    pub client: &'a dyn CanClient,
    pub deadline: Deadline,
    pub render_index: Option<&'a IndexRenderer>,
}

/// Serve a resolved CAN-path according to the negotiated format
pub(crate) async fn serve_path(
    ctx: &ServeCtx<'_>,
    url: &CanUrl,
    headers: &HeaderMap,
    path: &str,
    head: bool,
) -> GatewayResult<Response> {
    match negotiate(url, headers)? {
        ResponseFormat::Raw => serve_raw(ctx, path, head).await,
        ResponseFormat::Car => serve_car(ctx, path, head).await,
        ResponseFormat::Html => match serve_html(ctx, url, headers, path, head).await {
            Ok(response) => Ok(response),
            // Sloppy callers ask for HTML on plain files; fall back to serving
            // the file itself rather than failing the request.
            Err(err) if err.is_not_found() || matches!(err, GatewayError::InvalidInput(_)) => {
                serve_default(ctx, url, headers, path, head).await
            }
            Err(err) => Err(err),
        },
        ResponseFormat::DagCbor | ResponseFormat::DagJson => Err(GatewayError::InvalidInput(
            "dag encodings apply to the linked-data scheme".into(),
        )),
        ResponseFormat::Default => serve_default(ctx, url, headers, path, head).await,
    }
}

async fn serve_raw(ctx: &ServeCtx<'_>, path: &str, head: bool) -> GatewayResult<Response> {
    let stat = stat_path(ctx, path).await?;
    let block = ctx
        .deadline
        .run("block fetch", ctx.client.block_get(&stat.cid))
        .await?;
    let mut response = Response::new(StatusCode::OK)
        .with_content_type("application/vnd.ipld.raw")
        .with_header_value("content-length", &block.len().to_string());
    if !head {
        response = response.with_body(block);
    }
    Ok(response)
}

async fn serve_car(ctx: &ServeCtx<'_>, path: &str, head: bool) -> GatewayResult<Response> {
    let stat = stat_path(ctx, path).await?;
    let response = Response::new(StatusCode::OK).with_content_type("application/vnd.ipld.car");
    if head {
        return Ok(response);
    }
    let stream = ctx
        .deadline
        .run("archive export", ctx.client.export_car(&stat.cid))
        .await?;
    Ok(response.with_body(Body::Stream(until_cancelled(
        stream,
        ctx.deadline.cancel().clone(),
    ))))
}

async fn serve_html(
    ctx: &ServeCtx<'_>,
    url: &CanUrl,
    headers: &HeaderMap,
    path: &str,
    head: bool,
) -> GatewayResult<Response> {
    let entries = list(ctx, path).await?;
    // An index child wins over the listing page here too
    if has_index_child(&entries) && !url.has_query("noResolve") {
        let index_path = format!("{path}/index.html");
        let index_stat = stat_path(ctx, &index_path).await?;
        return serve_file(ctx, url, headers, &index_path, &index_stat, head).await;
    }
    let names = listing_names(&entries);
    let html = match ctx.render_index {
        Some(renderer) => renderer(url.raw(), &names),
        None => default_index(url.raw(), &names),
    };
    let mut response =
        Response::new(StatusCode::OK).with_content_type("text/html; charset=utf-8");
    if !head {
        response = response.with_body(html);
    }
    Ok(response)
}

async fn serve_default(
    ctx: &ServeCtx<'_>,
    url: &CanUrl,
    headers: &HeaderMap,
    path: &str,
    head: bool,
) -> GatewayResult<Response> {
    let stat = stat_path(ctx, path).await?;
    match stat.kind {
        EntryKind::Directory => {
            let entries = list(ctx, path).await?;
            if has_index_child(&entries) && !url.has_query("noResolve") {
                let index_path = format!("{path}/index.html");
                let index_stat = stat_path(ctx, &index_path).await?;
                serve_file(ctx, url, headers, &index_path, &index_stat, head).await
            } else if head {
                Ok(Response::new(StatusCode::OK))
            } else {
                let listing = serde_json::to_string(&listing_names(&entries))?;
                Ok(Response::ok(listing).with_content_type("application/json"))
            }
        }
        EntryKind::File | EntryKind::Raw => {
            serve_file(ctx, url, headers, path, &stat, head).await
        }
    }
}

/// Stream one file, honoring a single satisfiable byte range
pub(crate) async fn serve_file(
    ctx: &ServeCtx<'_>,
    url: &CanUrl,
    headers: &HeaderMap,
    path: &str,
    stat: &EntryStat,
    head: bool,
) -> GatewayResult<Response> {
    let content_type = sniff_content_type(url, path);
    let slice = range::resolve(headers, stat.size);

    let (status, offset, length, content_length) = match slice {
        Some(range) => (
            StatusCode::PARTIAL_CONTENT,
            Some(range.start),
            Some(range.len()),
            range.len(),
        ),
        None => (StatusCode::OK, None, None, stat.size),
    };

    let mut response = Response::new(status)
        .with_content_type(&content_type)
        .with_header_value("accept-ranges", "bytes")
        .with_header_value("content-length", &content_length.to_string());
    if let Some(range) = slice {
        response = response.with_header_value("content-range", &range.content_range(stat.size));
    }
    if head {
        return Ok(response);
    }

    let stream = ctx
        .deadline
        .run("file read", ctx.client.cat(path, offset, length))
        .await?;
    Ok(response.with_body(Body::Stream(until_cancelled(
        stream,
        ctx.deadline.cancel().clone(),
    ))))
}

/// HEAD resolution for a path: same headers as GET, empty body
pub(crate) async fn head_path(
    ctx: &ServeCtx<'_>,
    url: &CanUrl,
    headers: &HeaderMap,
    path: &str,
) -> GatewayResult<Response> {
    serve_path(ctx, url, headers, path, true).await
}

/// True when a directory carries a servable `index.html` child
fn has_index_child(entries: &[DirEntry]) -> bool {
    entries
        .iter()
        .any(|e| e.name == "index.html" && e.kind == EntryKind::File)
}

/// Listing names with a trailing `/` marking subdirectories
pub(crate) fn listing_names(entries: &[DirEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| match e.kind {
            EntryKind::Directory => format!("{}/", e.name),
            _ => e.name.clone(),
        })
        .collect()
}

/// Default directory index renderer
pub(crate) fn default_index(url: &str, names: &[String]) -> String {
    let mut items = String::new();
    for name in names {
        items.push_str(&format!(
            "    <li><a href=\"{name}\">{name}</a></li>\n"
        ));
    }
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"utf-8\"/>\n  \
         <title>Index of {url}</title>\n</head>\n<body>\n  <h1>Index of {url}</h1>\n  \
         <ul>\n{items}  </ul>\n</body>\n</html>\n"
    )
}

fn sniff_content_type(url: &CanUrl, path: &str) -> String {
    // `?filename=` overrides the sniff source; otherwise the served path's
    // last component decides (which may be a resolved `index.html`).
    let hint = url
        .query("filename")
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| path.rsplit('/').next().unwrap_or("").to_string());
    let mime = mime_guess::from_path(&hint).first_or_octet_stream();
    if mime.type_() == mime_guess::mime::TEXT && mime.get_param("charset").is_none() {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    }
}

async fn stat_path(ctx: &ServeCtx<'_>, path: &str) -> GatewayResult<EntryStat> {
    ctx.deadline.run("stat", ctx.client.stat(path)).await
}

async fn list(ctx: &ServeCtx<'_>, path: &str) -> GatewayResult<Vec<DirEntry>> {
    ctx.deadline.run("list", ctx.client.ls(path)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<DirEntry> {
        vec![
            DirEntry {
                name: "example".into(),
                kind: EntryKind::Directory,
                size: 0,
            },
            DirEntry {
                name: "index.html".into(),
                kind: EntryKind::File,
                size: 12,
            },
        ]
    }

    #[test]
    fn listing_marks_subdirectories() {
        assert_eq!(listing_names(&entries()), ["example/", "index.html"]);
    }

    #[test]
    fn default_index_links_every_child() {
        let html = default_index("content://bafyroot/", &listing_names(&entries()));
        assert!(html.contains("<a href=\"example/\">example/</a>"));
        assert!(html.contains("<a href=\"index.html\">index.html</a>"));
        assert!(html.contains("Index of content://bafyroot/"));
    }

    #[test]
    fn text_content_types_carry_a_charset() {
        let url = CanUrl::parse("content://bafyroot/example.txt").unwrap();
        assert_eq!(
            sniff_content_type(&url, "/content/bafyroot/example.txt"),
            "text/plain; charset=utf-8"
        );
        let url = CanUrl::parse("content://bafyroot/data.bin").unwrap();
        assert_eq!(
            sniff_content_type(&url, "/content/bafyroot/data.bin"),
            "application/octet-stream"
        );
    }

    #[test]
    fn filename_override_drives_the_sniff() {
        let url = CanUrl::parse("content://bafyroot/opaque?filename=page.html").unwrap();
        assert_eq!(
            sniff_content_type(&url, "/content/bafyroot/opaque"),
            "text/html; charset=utf-8"
        );
    }
}
