// Copyright (c) 2025 - Cowboy AI, LLC.

//! Content negotiation
//!
//! Maps the `?format=` query parameter and the `Accept` header to a response
//! encoding decision. The query parameter wins over the header; an
//! unrecognized query value is an input error, while unrecognized `Accept`
//! entries simply fall through to the default shape for the entry kind.

use http::header::{HeaderMap, ACCEPT};

use crate::errors::{GatewayError, GatewayResult};
use crate::url::CanUrl;

/// Negotiated response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Entry-kind default: file bytes or JSON directory listing
    Default,
    /// Single raw block bytes
    Raw,
    /// DAG-archive stream from the resolved root
    Car,
    /// Deterministic CBOR encoding of the resolved value
    DagCbor,
    /// Deterministic JSON encoding of the resolved value
    DagJson,
    /// Rendered HTML listing (directories)
    Html,
}

impl ResponseFormat {
    fn from_query_token(token: &str) -> Option<Self> {
        match token {
            "raw" => Some(ResponseFormat::Raw),
            "car" => Some(ResponseFormat::Car),
            "dag-cbor" | "cbor" => Some(ResponseFormat::DagCbor),
            "dag-json" | "json" => Some(ResponseFormat::DagJson),
            "html" => Some(ResponseFormat::Html),
            _ => Self::from_media_type(token),
        }
    }

    fn from_media_type(token: &str) -> Option<Self> {
        match token {
            "application/vnd.ipld.raw" => Some(ResponseFormat::Raw),
            "application/vnd.ipld.car" => Some(ResponseFormat::Car),
            "application/vnd.ipld.dag-cbor" => Some(ResponseFormat::DagCbor),
            "application/vnd.ipld.dag-json" | "application/json" => Some(ResponseFormat::DagJson),
            "text/html" => Some(ResponseFormat::Html),
            _ => None,
        }
    }
}

/// Decide the response shape for a request.
///
/// Precedence: `?format=` query, then the first recognized `Accept` entry,
/// then the default.
pub fn negotiate(url: &CanUrl, headers: &HeaderMap) -> GatewayResult<ResponseFormat> {
    if let Some(token) = url.query("format").filter(|t| !t.is_empty()) {
        return ResponseFormat::from_query_token(token).ok_or_else(|| {
            GatewayError::InvalidInput(format!("unrecognized format parameter: {token}"))
        });
    }

    for value in headers.get_all(ACCEPT) {
        let Ok(value) = value.to_str() else { continue };
        for entry in value.split(',') {
            let media = entry.split(';').next().unwrap_or("").trim();
            if let Some(format) = ResponseFormat::from_media_type(media) {
                return Ok(format);
            }
        }
    }

    Ok(ResponseFormat::Default)
}

/// True when the request asks for a server-sent event stream
pub fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|entry| entry.split(';').next().unwrap_or("").trim() == "text/event-stream")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn accept(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, value.parse().unwrap());
        headers
    }

    #[test_case("raw", ResponseFormat::Raw)]
    #[test_case("car", ResponseFormat::Car)]
    #[test_case("dag-cbor", ResponseFormat::DagCbor)]
    #[test_case("dag-json", ResponseFormat::DagJson)]
    #[test_case("json", ResponseFormat::DagJson)]
    #[test_case("html", ResponseFormat::Html)]
    #[test_case("application/vnd.ipld.car", ResponseFormat::Car)]
    fn query_tokens_map(token: &str, expected: ResponseFormat) {
        let url = CanUrl::parse(&format!("content://bafyroot/?format={token}")).unwrap();
        assert_eq!(negotiate(&url, &HeaderMap::new()).unwrap(), expected);
    }

    #[test_case("application/vnd.ipld.raw", ResponseFormat::Raw)]
    #[test_case("application/vnd.ipld.dag-cbor", ResponseFormat::DagCbor)]
    #[test_case("application/json", ResponseFormat::DagJson)]
    #[test_case("text/html", ResponseFormat::Html)]
    fn accept_entries_map(value: &str, expected: ResponseFormat) {
        let url = CanUrl::parse("content://bafyroot/").unwrap();
        assert_eq!(negotiate(&url, &accept(value)).unwrap(), expected);
    }

    #[test]
    fn query_beats_accept() {
        let url = CanUrl::parse("content://bafyroot/?format=raw").unwrap();
        let format = negotiate(&url, &accept("text/html")).unwrap();
        assert_eq!(format, ResponseFormat::Raw);
    }

    #[test]
    fn unknown_accept_falls_through_to_default() {
        let url = CanUrl::parse("content://bafyroot/").unwrap();
        let format = negotiate(&url, &accept("image/png, */*;q=0.8")).unwrap();
        assert_eq!(format, ResponseFormat::Default);
    }

    #[test]
    fn unknown_format_parameter_is_an_error() {
        let url = CanUrl::parse("content://bafyroot/?format=yaml").unwrap();
        assert!(negotiate(&url, &HeaderMap::new()).is_err());
    }

    #[test]
    fn event_stream_accept_is_detected() {
        assert!(wants_event_stream(&accept("text/event-stream")));
        assert!(wants_event_stream(&accept("application/json, text/event-stream;q=0.9")));
        assert!(!wants_event_stream(&accept("application/json")));
    }
}
