// Copyright (c) 2025 - Cowboy AI, LLC.

//! Copy-on-write tree mutation
//!
//! Every write against a content root goes through a scratch workspace: the
//! old root (when present) is materialized under a unique scratch path, the
//! operation is applied there, and the workspace is stat-ed to obtain the new
//! root identifier. The adapter holds no long-lived mutable references; the
//! scratch subtree is self-contained and reclaimed asynchronously.

use std::sync::Arc;

use bytes::Bytes;
use cid::Cid;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::{CanClient, Deadline, WriteOptions};
use crate::errors::{GatewayError, GatewayResult};
use crate::multipart::FormPart;
use crate::url::encode_segment;
use crate::cid as cid_util;

/// Root prefix for scratch workspaces inside the client's mutable tree
const SCRATCH_ROOT: &str = "/gateway-tmp";

/// Mutation applied to a scratch workspace
pub enum TreeOp {
    /// Write one file at the relative path
    WriteOne(Bytes),
    /// Write each named form part under the relative path
    WriteForm(Vec<FormPart>),
    /// Recursively remove the relative path
    Delete,
}

/// Apply a mutation against an optional old root, yielding the new root CID.
///
/// The relative path must be non-empty for [`TreeOp::WriteOne`] and
/// [`TreeOp::Delete`]; a form write may target the root itself.
pub async fn apply(
    client: &Arc<dyn CanClient>,
    deadline: &Deadline,
    old_root: Option<&Cid>,
    rel_path: &str,
    op: TreeOp,
) -> GatewayResult<Cid> {
    let scratch = format!("{SCRATCH_ROOT}/{}", Uuid::new_v4().simple());
    debug!(scratch = %scratch, "staging tree mutation");

    if let Some(root) = old_root {
        let source = format!("/content/{}", cid_util::to_base32(root)?);
        deadline
            .run("workspace copy", client.copy(&source, &scratch))
            .await?;
    } else {
        deadline.run("workspace init", client.mkdir(&scratch)).await?;
    }

    match op {
        TreeOp::WriteOne(payload) => {
            if rel_path.is_empty() {
                return Err(GatewayError::InvalidInput(
                    "file writes require a non-empty path".into(),
                ));
            }
            let target = join(&scratch, rel_path);
            deadline
                .run(
                    "file write",
                    client.write(&target, payload, WriteOptions::default()),
                )
                .await?;
        }
        TreeOp::WriteForm(parts) => {
            let base = if rel_path.is_empty() {
                scratch.clone()
            } else {
                join(&scratch, rel_path)
            };
            // An all-field form still yields a (possibly empty) directory
            deadline.run("workspace touch", client.mkdir(&base)).await?;
            // Later duplicates overwrite earlier ones: sequential writes.
            for part in parts {
                let Some(filename) = part.filename.as_deref() else {
                    continue;
                };
                if part.name != "file" {
                    continue;
                }
                let target = join(&base, &encode_segment(filename));
                deadline
                    .run(
                        "form write",
                        client.write(&target, part.data, WriteOptions::default()),
                    )
                    .await?;
            }
        }
        TreeOp::Delete => {
            if rel_path.is_empty() {
                return Err(GatewayError::InvalidInput(
                    "deletes require a non-empty path".into(),
                ));
            }
            let target = join(&scratch, rel_path);
            deadline
                .run("tree remove", client.remove(&target, true))
                .await?;
        }
    }

    let stat = deadline.run("workspace stat", client.stat(&scratch)).await?;
    release(client, scratch);
    Ok(cid_util::to_v1(&stat.cid))
}

/// Compose the canonical URL for a successful write.
///
/// Single-file writes strip the trailing slash; form writes keep the path as
/// the caller gave it (typically a directory).
pub fn result_url(new_root: &Cid, encoded_path: &str, keep_trailing_slash: bool) -> GatewayResult<String> {
    let root = cid_util::to_base32(new_root)?;
    let trimmed = encoded_path.trim_matches('/');
    Ok(match (trimmed.is_empty(), keep_trailing_slash) {
        (true, _) => format!("content://{root}/"),
        (false, true) => format!("content://{root}/{trimmed}/"),
        (false, false) => format!("content://{root}/{trimmed}"),
    })
}

fn join(base: &str, rel: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), rel.trim_matches('/'))
}

/// Scratch workspaces are reclaimed off the request path; persistence of the
/// scratch name is neither guaranteed nor required.
fn release(client: &Arc<dyn CanClient>, scratch: String) {
    let client = Arc::clone(client);
    tokio::spawn(async move {
        if let Err(err) = client.remove(&scratch, true).await {
            warn!(scratch = %scratch, error = %err, "scratch release failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_normalizes_separators() {
        assert_eq!(join("/gateway-tmp/x", "a/b.txt"), "/gateway-tmp/x/a/b.txt");
        assert_eq!(join("/gateway-tmp/x/", "/a"), "/gateway-tmp/x/a");
    }

    #[test]
    fn result_urls_respect_trailing_slash_policy() {
        let root = cid_util::for_content(cid_util::codec::DAG_PB, b"root");
        let base32 = cid_util::to_base32(&root).unwrap();

        let file = result_url(&root, "example.txt", false).unwrap();
        assert_eq!(file, format!("content://{base32}/example.txt"));

        let dir = result_url(&root, "uploads/", true).unwrap();
        assert_eq!(dir, format!("content://{base32}/uploads/"));

        let bare = result_url(&root, "", true).unwrap();
        assert_eq!(bare, format!("content://{base32}/"));
    }
}
