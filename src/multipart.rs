// Copyright (c) 2025 - Cowboy AI, LLC.

//! Minimal `multipart/form-data` reader
//!
//! Form-write requests carry files as multipart bodies. This reader covers
//! the subset the tree builder consumes: boundary extraction from the
//! `Content-Type` header, per-part headers, and raw part bytes. Parts are
//! returned in wire order so later duplicates can overwrite earlier ones.

use bytes::Bytes;

use crate::errors::{GatewayError, GatewayResult};

/// One decoded form part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    /// Field name from `Content-Disposition`
    pub name: String,
    /// Filename from `Content-Disposition`, if the part carries one
    pub filename: Option<String>,
    /// Part `Content-Type`, if present
    pub content_type: Option<String>,
    /// Raw part payload
    pub data: Bytes,
}

/// Extract the boundary token from a `multipart/form-data` content type
pub fn boundary(content_type: &str) -> Option<String> {
    let mut pieces = content_type.split(';');
    if pieces.next()?.trim() != "multipart/form-data" {
        return None;
    }
    for piece in pieces {
        let piece = piece.trim();
        if let Some(value) = piece.strip_prefix("boundary=") {
            let value = value.trim_matches('"');
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Parse a multipart body into its parts
pub fn parse(body: &[u8], boundary: &str) -> GatewayResult<Vec<FormPart>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();

    let mut cursor = find(body, delimiter)
        .ok_or_else(|| GatewayError::InvalidInput("multipart body missing boundary".into()))?
        + delimiter.len();

    loop {
        // Closing delimiter is `--boundary--`
        if body[cursor..].starts_with(b"--") {
            break;
        }
        let after_crlf = skip_crlf(body, cursor)?;

        let headers_end = find(&body[after_crlf..], b"\r\n\r\n").ok_or_else(|| {
            GatewayError::InvalidInput("multipart part missing header terminator".into())
        })?;
        let header_block = &body[after_crlf..after_crlf + headers_end];
        let content_start = after_crlf + headers_end + 4;

        let next_delim = find(&body[content_start..], delimiter).ok_or_else(|| {
            GatewayError::InvalidInput("multipart part missing closing boundary".into())
        })?;
        // Part content ends before the CRLF preceding the next delimiter
        let content_end = (content_start + next_delim).saturating_sub(2);

        parts.push(decode_part(
            header_block,
            Bytes::copy_from_slice(&body[content_start..content_end.max(content_start)]),
        )?);

        cursor = content_start + next_delim + delimiter.len();
    }

    Ok(parts)
}

fn decode_part(header_block: &[u8], data: Bytes) -> GatewayResult<FormPart> {
    let headers = std::str::from_utf8(header_block)
        .map_err(|_| GatewayError::InvalidInput("multipart headers are not UTF-8".into()))?;

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in headers.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for attr in value.split(';').map(str::trim) {
                if let Some(v) = attr.strip_prefix("name=") {
                    name = Some(v.trim_matches('"').to_string());
                } else if let Some(v) = attr.strip_prefix("filename=") {
                    filename = Some(v.trim_matches('"').to_string());
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.to_string());
        }
    }

    Ok(FormPart {
        name: name
            .ok_or_else(|| GatewayError::InvalidInput("multipart part missing field name".into()))?,
        filename,
        content_type,
        data,
    })
}

fn skip_crlf(body: &[u8], cursor: usize) -> GatewayResult<usize> {
    if body[cursor..].starts_with(b"\r\n") {
        Ok(cursor + 2)
    } else {
        Err(GatewayError::InvalidInput(
            "malformed multipart delimiter line".into(),
        ))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
