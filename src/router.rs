// Copyright (c) 2025 - Cowboy AI, LLC.

//! Request routing
//!
//! [`Gateway`] owns the route table: it parses the request URL, applies the
//! writable gate, pattern-matches (scheme, method, host) to a handler, and
//! maps every failure kind to its response. The CAN client is handed in at
//! construction and never owned beyond an `Arc`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::header::HeaderMap;
use http::{Method, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{CanClient, Deadline};
use crate::errors::{GatewayError, GatewayResult};
use crate::handlers;
use crate::request::{Request, Response};
use crate::serve::ServeCtx;
use crate::url::{CanUrl, Scheme};

/// Renderer hook for HTML directory listings: `(url, names) -> html`
pub type IndexRenderer = dyn Fn(&str, &[String]) -> String + Send + Sync;

/// Handler hook for unmatched routes
pub type NotFoundHandler = dyn Fn(&Method, &CanUrl) -> Response + Send + Sync;

/// Construction parameters for a [`Gateway`]
#[derive(Clone)]
pub struct GatewayConfig {
    /// Deadline for block, DAG, and export operations, in milliseconds
    pub timeout_ms: u64,
    /// Deadline for naming operations, in milliseconds
    pub name_timeout_ms: u64,
    /// When false, every mutating route falls through to the not-found handler
    pub writable: bool,
    /// Headers applied to all responses (existing values win)
    pub default_headers: HeaderMap,
    /// HTML listing renderer; `None` uses the built-in page
    pub render_index: Option<Arc<IndexRenderer>>,
    /// Handler for unmatched routes; `None` answers 405
    pub on_not_found: Option<Arc<NotFoundHandler>>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            name_timeout_ms: 120_000,
            writable: true,
            default_headers: HeaderMap::new(),
            render_index: None,
            on_not_found: None,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("timeout_ms", &self.timeout_ms)
            .field("name_timeout_ms", &self.name_timeout_ms)
            .field("writable", &self.writable)
            .field("default_headers", &self.default_headers)
            .field("render_index", &self.render_index.is_some())
            .field("on_not_found", &self.on_not_found.is_some())
            .finish()
    }
}

/// The protocol adapter: routes fetch-shaped requests onto a CAN client
pub struct Gateway {
    client: Arc<dyn CanClient>,
    config: GatewayConfig,
}

impl Gateway {
    /// Gateway with default configuration
    pub fn new(client: Arc<dyn CanClient>) -> Self {
        Self::with_config(client, GatewayConfig::default())
    }

    /// Gateway with explicit configuration
    pub fn with_config(client: Arc<dyn CanClient>, config: GatewayConfig) -> Self {
        Self { client, config }
    }

    /// The embedded client handle
    pub fn client(&self) -> &Arc<dyn CanClient> {
        &self.client
    }

    /// Handle one request end-to-end.
    ///
    /// Never fails: every error kind maps to a status and diagnostic body.
    pub async fn fetch(&self, req: Request) -> Response {
        let url = match CanUrl::parse(&req.url) {
            Ok(url) => url,
            Err(err) => return self.finish(error_response(&err, None)),
        };
        let method = req.method.clone();
        debug!(method = %method, url = %req.url, "routing request");

        if !self.config.writable && is_mutating(&method) {
            return self.finish(self.not_found(&method, &url));
        }

        match self.dispatch(&url, req).await {
            Ok(response) => self.finish(response),
            Err(GatewayError::Unsupported) => self.finish(method_not_supported(url.scheme())),
            Err(err) => {
                warn!(method = %method, url = %url, error = %err, "request failed");
                self.finish(error_response(&err, Some(url.scheme())))
            }
        }
    }

    async fn dispatch(&self, url: &CanUrl, req: Request) -> GatewayResult<Response> {
        use handlers::{bus, content, linked, name};

        match (url.scheme(), req.method.as_str()) {
            (Scheme::Content, "GET") => content::get(self, url, req).await,
            (Scheme::Content, "HEAD") => content::head(self, url, req).await,
            (Scheme::Content, "POST") => content::post(self, url, req).await,
            (Scheme::Content, "PUT") => content::put(self, url, req).await,
            (Scheme::Content, "DELETE") => content::delete(self, url, req).await,

            (Scheme::Name, "GET") => name::get(self, url, req).await,
            (Scheme::Name, "HEAD") => name::head(self, url, req).await,
            (Scheme::Name, "POST") => name::post(self, url, req).await,
            (Scheme::Name, "PUT") => name::put(self, url, req).await,
            (Scheme::Name, "DELETE") => name::delete(self, url, req).await,

            (Scheme::Linked, "GET") => linked::get(self, url, req).await,
            (Scheme::Linked, "POST") => linked::post(self, url, req).await,
            (Scheme::Linked, "PATCH") => linked::patch(self, url, req).await,

            (Scheme::Bus, "GET") => bus::get(self, url, req).await,
            (Scheme::Bus, "POST") => bus::post(self, url, req).await,

            _ => Ok(self.not_found(&req.method, url)),
        }
    }

    fn not_found(&self, method: &Method, url: &CanUrl) -> Response {
        match &self.config.on_not_found {
            Some(handler) => handler(method, url),
            None => method_not_supported(url.scheme()),
        }
    }

    fn finish(&self, mut response: Response) -> Response {
        for (name, value) in &self.config.default_headers {
            if !response.headers.contains_key(name) {
                response.headers.insert(name.clone(), value.clone());
            }
        }
        response
    }

    pub(crate) fn short_deadline(&self, cancel: &CancellationToken) -> Deadline {
        Deadline::new(cancel.clone(), Duration::from_millis(self.config.timeout_ms))
    }

    pub(crate) fn name_deadline(&self, cancel: &CancellationToken) -> Deadline {
        Deadline::new(
            cancel.clone(),
            Duration::from_millis(self.config.name_timeout_ms),
        )
    }

    pub(crate) fn serve_ctx(&self, cancel: &CancellationToken) -> ServeCtx<'_> {
        ServeCtx {
            client: self.client.as_ref(),
            deadline: self.short_deadline(cancel),
            render_index: self.config.render_index.as_deref(),
        }
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        method.as_str(),
        "POST" | "PUT" | "DELETE" | "PATCH"
    )
}

/// Verbs a scheme answers, for the `Allow` header
fn allowed_methods(scheme: Scheme) -> &'static str {
    match scheme {
        Scheme::Content | Scheme::Name => "GET, HEAD, POST, PUT, DELETE",
        Scheme::Linked => "GET, POST, PATCH",
        Scheme::Bus => "GET, POST",
    }
}

fn method_not_supported(scheme: Scheme) -> Response {
    Response::new(StatusCode::METHOD_NOT_ALLOWED)
        .with_header_value("allow", allowed_methods(scheme))
        .with_content_type("text/plain; charset=utf-8")
        .with_body("Method Not Supported")
}

fn error_response(err: &GatewayError, scheme: Option<Scheme>) -> Response {
    if matches!(err, GatewayError::Unsupported) {
        if let Some(scheme) = scheme {
            return method_not_supported(scheme);
        }
    }
    Response::new(err.status())
        .with_content_type("text/plain; charset=utf-8")
        .with_body(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_the_documented_tunables() {
        let config = GatewayConfig::default();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.name_timeout_ms, 120_000);
        assert!(config.writable);
        assert!(config.default_headers.is_empty());
    }

    #[test]
    fn allow_headers_follow_the_route_matrix() {
        assert_eq!(allowed_methods(Scheme::Content), "GET, HEAD, POST, PUT, DELETE");
        assert_eq!(allowed_methods(Scheme::Linked), "GET, POST, PATCH");
        assert_eq!(allowed_methods(Scheme::Bus), "GET, POST");
    }

    #[test]
    fn unsupported_maps_to_405_with_allow() {
        let response = error_response(&GatewayError::Unsupported, Some(Scheme::Linked));
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.header("allow"), Some("GET, POST, PATCH"));
    }
}
