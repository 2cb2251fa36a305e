//! Error types for the Linkding API client.
//!
//! # Design
//! Only two kinds of failure come out of an API call: the transport failed
//! (`TransportError`, passed through untouched) or the body did not decode
//! into the expected shape (`ApiError::Decode`). The parsers never look at
//! status codes; a transport that wants non-2xx responses treated as failures
//! reports them as `TransportError::Status`.

use thiserror::Error;

/// Failures reported by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A URL could not be turned into a request: the input of the check
    /// endpoint or a page cursor.
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The connection could not be established or broke mid-request.
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Errors returned by the `parse_*` methods and the resource mappers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Encode(#[source] serde_json::Error),
}

impl TransportError {
    pub(crate) fn invalid_url(url: &str, reason: impl std::fmt::Display) -> Self {
        TransportError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl ApiError {
    /// Status code of the failed response, when the transport reported one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport(TransportError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

/// Invalid [`ClientConfig`](crate::ClientConfig) values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base url is required")]
    MissingBaseUrl,

    #[error("base url {url:?} is not an absolute http(s) url")]
    InvalidBaseUrl { url: String },

    #[error("api token is required")]
    MissingToken,
}
