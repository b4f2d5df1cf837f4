//! Error types for the data-link server.
//!
//! [`DataLinkError`] covers failures answered over HTTP and converts into
//! an Axum response via its [`IntoResponse`] implementation.
//! [`ServerError`] covers lifecycle failures reported to the host.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use datalink_core::RegistryError;

/// Errors answered to an HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum DataLinkError {
    /// The request could not be interpreted (e.g. a bad query string).
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The request head plus declared body exceeds the configured maximum.
    #[error("request of {length} bytes exceeds the {limit} byte limit")]
    RequestTooLarge {
        /// Declared request size in bytes.
        length: u64,
        /// Configured maximum in bytes.
        limit: u64,
    },

    /// The path is served, but not with this method.
    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    /// A response could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DataLinkError {
    /// The HTTP status this error is answered with.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Self::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Serialization(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DataLinkError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Errors that can occur when building, starting, or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A listener could not be created on one of the bind addresses.
    #[error("bind error on {address}: {source}")]
    Bind {
        /// The address that failed.
        address: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// `start` was called on a server that is already running.
    #[error("data link is already running")]
    AlreadyRunning,

    /// A listener failed while serving.
    #[error("serve error: {source}")]
    Serve {
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The built-in capability chain could not be assembled.
    #[error("registry error: {source}")]
    Registry {
        /// The underlying registry error.
        #[from]
        source: RegistryError,
    },
}
