// Copyright (c) 2025 - Cowboy AI, LLC.

//! Byte-range serving
//!
//! A GET on a file honors a `Range` header when it parses to exactly one
//! satisfiable `bytes` range against the known total size. Every other parse
//! outcome (absent header, multiple ranges, unsatisfiable bounds, foreign
//! units) falls back to the full 200 response rather than an error.

use std::ops::Bound;

use headers::{HeaderMapExt, Range};
use http::header::HeaderMap;

/// One inclusive byte range `[start, end]` within a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset, inclusive
    pub start: u64,
    /// Last byte offset, inclusive
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes the slice covers
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ranges are never empty; present for API completeness
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` header value against the total size
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Decide the byte slice for a request against a known total size.
///
/// `None` means serve the full entity.
pub fn resolve(headers: &HeaderMap, size: u64) -> Option<ByteRange> {
    if size == 0 {
        return None;
    }
    let range: Range = headers.typed_get()?;
    let mut satisfiable = range.satisfiable_ranges(size);
    let (start_bound, end_bound) = satisfiable.next()?;
    if satisfiable.next().is_some() {
        // Multipart ranges are not served
        return None;
    }

    let start = match start_bound {
        Bound::Included(s) => s,
        Bound::Excluded(s) => s.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match end_bound {
        Bound::Included(e) => e.min(size - 1),
        Bound::Excluded(e) => e.checked_sub(1)?.min(size - 1),
        Bound::Unbounded => size - 1,
    };
    if start > end || start >= size {
        return None;
    }
    Some(ByteRange { start, end })
}
