// Copyright (c) 2025 - Cowboy AI, LLC.

//! Error types for gateway operations
//!
//! Every fallible path in the gateway funnels into [`GatewayError`]. The
//! variants are the abstract failure kinds of the adapter; [`GatewayError::status`]
//! gives the response status each kind maps to, and the `Display` form is the
//! diagnostic body sent to the caller.

use http::StatusCode;
use thiserror::Error;

/// Errors that can occur while translating a request into CAN operations
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The path, entry, key, or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// An upstream capability call exceeded its deadline
    #[error("TimeoutError: {0}")]
    Timeout(String),

    /// The request carried an invalid URL, codec, format, or body
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The method × scheme combination is not supported
    #[error("Method Not Supported")]
    Unsupported,

    /// The request signal was closed before the operation finished
    #[error("Request aborted")]
    Cancelled,

    /// Any other failure inside the gateway or the CAN client
    #[error("Internal error: {0}")]
    Internal(String),

    /// JSON encode/decode failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CBOR encode/decode failure
    #[error("CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),

    /// Content identifier parse failure
    #[error("CID error: {0}")]
    Cid(#[from] cid::Error),
}

impl GatewayError {
    /// Status code this failure kind maps to
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            GatewayError::InvalidInput(_)
            | GatewayError::Json(_)
            | GatewayError::Cbor(_)
            | GatewayError::Cid(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unsupported => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Cancelled | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// True when the failure kind is a missing entry
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
