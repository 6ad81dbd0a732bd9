//! Errors for Agenta API calls.
//!
//! A 404 maps to `NotFound` so callers can tell a missing app, variant or
//! test set apart from a failing backend. Every other non-2xx status keeps
//! its code and raw body in `HttpError`.

/// Errors returned by `AgentaClient` and `AgentaApi` operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The request never produced a response (connect, TLS, timeout, ...).
    #[error("transport failed: {0}")]
    Transport(String),

    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// A top-level generate input used a key the request body reserves.
    #[error("input key {0:?} is reserved")]
    ReservedKey(String),
}

pub type ApiResult<T> = Result<T, ApiError>;
