// Copyright (c) 2025 - Cowboy AI, LLC.

//! Request and response surface
//!
//! The gateway speaks a fetch-shaped contract: a [`Request`] carries a method,
//! a URL string, case-insensitive headers, a lazy body, and a cancellation
//! signal; a [`Response`] carries a status, headers, and a body that may
//! stream. Bodies are consumed exactly once, and closing the request signal
//! ends any stream the response hands out.

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::errors::{GatewayError, GatewayResult};

/// A lazily-produced byte sequence
pub type ByteStream = BoxStream<'static, GatewayResult<Bytes>>;

/// Request or response payload
pub enum Body {
    /// No payload
    Empty,
    /// Eager bytes
    Bytes(Bytes),
    /// Lazy byte stream
    Stream(ByteStream),
}

impl Body {
    /// Empty body
    pub fn empty() -> Self {
        Body::Empty
    }

    /// True when no payload is present at all
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Bytes(b) => b.is_empty(),
            Body::Stream(_) => false,
        }
    }

    /// Drain the body into a single buffer, honoring the request signal
    pub async fn into_bytes(self, cancel: &CancellationToken) -> GatewayResult<Bytes> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Bytes(b) => Ok(b),
            Body::Stream(mut stream) => {
                let mut buf = Vec::new();
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                        chunk = stream.next() => match chunk {
                            Some(chunk) => buf.extend_from_slice(&chunk?),
                            None => break,
                        }
                    }
                }
                Ok(Bytes::from(buf))
            }
        }
    }

    /// View the body as a stream, whatever its storage
    pub fn into_stream(self) -> ByteStream {
        match self {
            Body::Empty => futures::stream::empty().boxed(),
            Body::Bytes(b) => futures::stream::once(async move { Ok(b) }).boxed(),
            Body::Stream(s) => s,
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Bytes(b) => write!(f, "Body::Bytes({} bytes)", b.len()),
            Body::Stream(_) => f.write_str("Body::Stream(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Body::Bytes(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(value))
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::Bytes(Bytes::from(value))
    }
}

impl From<&'static str> for Body {
    fn from(value: &'static str) -> Self {
        Body::Bytes(Bytes::from_static(value.as_bytes()))
    }
}

/// End a stream early once the request signal closes
pub fn until_cancelled(stream: ByteStream, cancel: CancellationToken) -> ByteStream {
    async_stream::stream! {
        let mut stream = stream;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                chunk = stream.next() => match chunk {
                    Some(chunk) => yield chunk,
                    None => break,
                }
            }
        }
    }
    .boxed()
}

/// One call into the adapter
#[derive(Debug)]
pub struct Request {
    /// Request method
    pub method: Method,
    /// Request URL, one of the four CAN schemes
    pub url: String,
    /// Case-insensitive header multimap
    pub headers: HeaderMap,
    /// Request payload, readable once
    pub body: Body,
    /// Cancellation signal; closing it ends the request end-to-end
    pub cancel: CancellationToken,
}

impl Request {
    /// New request with an empty body and a fresh signal
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Body::Empty,
            cancel: CancellationToken::new(),
        }
    }

    /// GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// HEAD request
    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    /// POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// PUT request
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// DELETE request
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// PATCH request
    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    /// Append a header, keeping any existing values for the name
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.parse::<HeaderName>(),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Attach a body
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach an externally-owned cancellation signal
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// First value of a header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Result of one call into the adapter
#[derive(Debug)]
pub struct Response {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response payload; drainable independently of the request
    pub body: Body,
}

impl Response {
    /// New response with the given status and empty body
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::Empty,
        }
    }

    /// 200 response with a body
    pub fn ok(body: impl Into<Body>) -> Self {
        Self::new(StatusCode::OK).with_body(body)
    }

    /// 201 response pointing at a created resource
    pub fn created(location: &str) -> Self {
        Self::new(StatusCode::CREATED).with_header_value("location", location)
    }

    /// 302 redirect
    pub fn found(location: &str) -> Self {
        Self::new(StatusCode::FOUND).with_header_value("location", location)
    }

    /// Attach a body
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header, replacing prior values
    pub fn with_header_value(mut self, name: &'static str, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(HeaderName::from_static(name), v);
            }
            Err(_) => {
                tracing::warn!(header = name, "dropping response header with invalid value");
            }
        }
        self
    }

    /// Set the `Content-Type` header
    pub fn with_content_type(self, value: &str) -> Self {
        self.with_header_value("content-type", value)
    }

    /// First value of a header, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Drain the response body into a buffer (test and shim convenience)
    pub async fn into_bytes(self) -> GatewayResult<Bytes> {
        self.body.into_bytes(&CancellationToken::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn eager_and_empty_bodies_drain() {
        let cancel = CancellationToken::new();
        assert!(Body::Empty.into_bytes(&cancel).await.unwrap().is_empty());
        let body = Body::from("hello");
        assert_eq!(&body.into_bytes(&cancel).await.unwrap()[..], b"hello");
    }

    #[tokio::test]
    async fn streamed_body_concatenates_chunks() {
        let chunks: Vec<GatewayResult<Bytes>> =
            vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))];
        let body = Body::Stream(futures::stream::iter(chunks).boxed());
        let cancel = CancellationToken::new();
        assert_eq!(&body.into_bytes(&cancel).await.unwrap()[..], b"abcd");
    }

    #[tokio::test]
    async fn cancelled_signal_stops_draining() {
        let body = Body::Stream(futures::stream::pending().boxed());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = body.into_bytes(&cancel).await.unwrap_err();
        assert!(matches!(err, GatewayError::Cancelled));
    }

    #[tokio::test]
    async fn until_cancelled_ends_the_stream() {
        let cancel = CancellationToken::new();
        let stream = until_cancelled(futures::stream::pending().boxed(), cancel.clone());
        cancel.cancel();
        let collected: Vec<_> = stream.collect().await;
        assert!(collected.is_empty());
    }

    #[test]
    fn request_headers_are_case_insensitive() {
        let req = Request::get("content://bafyroot/").with_header("Accept", "text/html");
        assert_eq!(req.header("accept"), Some("text/html"));
        assert_eq!(req.header("ACCEPT"), Some("text/html"));
    }
}
