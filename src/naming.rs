// Copyright (c) 2025 - Cowboy AI, LLC.

//! Mutable naming subsystem
//!
//! Key lifecycle and record publication over the client's key set. Aliases
//! and public key identifiers are interchangeable on the request surface: a
//! host token matches a key when it equals the alias or the version-1 base36
//! form of the public key. DNS-style hostnames (containing a dot) resolve
//! through the naming capability directly.

use std::sync::Arc;

use cid::Cid;
use tracing::debug;

use crate::client::{CanClient, Deadline, KeyInfo};
use crate::errors::{GatewayError, GatewayResult};
use crate::url::{CanUrl, Scheme};
use crate::cid as cid_util;

/// Canonical name URL for a key, e.g. `name://k…/`
pub fn name_url(key: &KeyInfo) -> GatewayResult<String> {
    Ok(format!("name://{}/", cid_util::to_base36(&key.id)?))
}

/// Find a key by alias or public identifier.
///
/// Matches when the token equals the local alias, or when it parses as a CID
/// equal to the version-1 form of the public key.
pub async fn has_key(
    client: &Arc<dyn CanClient>,
    deadline: &Deadline,
    token: &str,
) -> GatewayResult<Option<KeyInfo>> {
    let keys = deadline.run("key listing", client.key_list()).await?;
    let as_cid: Option<Cid> = token.parse().ok().map(|c: Cid| cid_util::to_v1(&c));
    Ok(keys.into_iter().find(|key| {
        key.name == token || as_cid.map(|c| c == cid_util::to_v1(&key.id)).unwrap_or(false)
    }))
}

/// Create a key if missing and give it a navigable root.
///
/// Fresh keys publish the empty-directory sentinel so a name URL resolves
/// immediately after creation. Existing aliases are returned as-is.
pub async fn ensure_key(
    client: &Arc<dyn CanClient>,
    deadline: &Deadline,
    alias: &str,
) -> GatewayResult<KeyInfo> {
    if let Some(existing) = has_key(client, deadline, alias).await? {
        return Ok(existing);
    }
    let key = deadline.run("key creation", client.key_gen(alias)).await?;
    debug!(alias = %alias, "created naming key");
    let empty_root = format!("/content/{}/", cid_util::EMPTY_DIR_CID);
    deadline
        .run(
            "initial record publish",
            client.name_publish(alias, &empty_root, true),
        )
        .await?;
    Ok(key)
}

/// Publish a CAN-path under a key token (alias or public id).
///
/// At-most-once per request: exactly one record is emitted on success.
pub async fn publish(
    client: &Arc<dyn CanClient>,
    deadline: &Deadline,
    token: &str,
    can_path: &str,
) -> GatewayResult<KeyInfo> {
    let key = has_key(client, deadline, token)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("no key matches {token}")))?;
    deadline
        .run(
            "record publish",
            client.name_publish(&key.name, can_path, true),
        )
        .await?;
    Ok(key)
}

/// Resolve a name host to the CAN-path currently published under it
pub async fn resolve_root(
    client: &Arc<dyn CanClient>,
    deadline: &Deadline,
    host: &str,
) -> GatewayResult<String> {
    // Dotted hosts are DNS-style names; the naming capability owns them
    if host.contains('.') {
        return deadline
            .run("name resolution", client.name_resolve(host))
            .await;
    }
    let target = match has_key(client, deadline, host).await? {
        Some(key) => cid_util::to_base36(&key.id)?,
        None => host.to_string(),
    };
    deadline
        .run("name resolution", client.name_resolve(&target))
        .await
}

/// Normalize a publication target into a canonical `/content/…` record value.
///
/// Only content URLs (or bare content CAN-paths) are publishable under a
/// name; anything else is rejected before a record is emitted.
pub fn normalize_target(target: &str) -> GatewayResult<String> {
    let target = target.trim();
    if target.starts_with("/content/") {
        return Ok(ensure_trailing_slash(target));
    }
    let url = CanUrl::parse(target)?;
    if url.scheme() != Scheme::Content {
        return Err(GatewayError::InvalidInput(format!(
            "publish targets must be content URLs, got a {} URL",
            url.scheme()
        )));
    }
    Ok(ensure_trailing_slash(&url.can_path()))
}

/// Extract the root CID from a canonical `/content/<cid>/…` path
pub fn root_cid(can_path: &str) -> Option<Cid> {
    let mut segments = can_path.split('/').filter(|s| !s.is_empty());
    match segments.next() {
        Some("content") => segments.next().and_then(|token| token.parse().ok()),
        _ => None,
    }
}

fn ensure_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn publication_targets_are_normalized() {
        assert_eq!(
            normalize_target("content://bafyaabakaieac/docs").unwrap(),
            "/content/bafyaabakaieac/docs/"
        );
        assert_eq!(
            normalize_target("/content/bafyaabakaieac/").unwrap(),
            "/content/bafyaabakaieac/"
        );
    }

    #[test]
    fn only_content_targets_are_publishable() {
        assert!(normalize_target("name://alias-or-key/").is_err());
        assert!(normalize_target("/name/alias-or-key/").is_err());
        assert!(normalize_target("bus://topic/").is_err());
        assert!(normalize_target("linked://bafyroot/").is_err());
    }
}
