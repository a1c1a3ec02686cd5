//! Error types for the fetch layer.
//!
//! # Design
//! Builder-time and dispatch-time validation failures (`UnknownMethod`,
//! `InvalidUrl`) are returned synchronously. Everything that happens on the
//! worker (`Transport`, `Task`) arrives through the `Pending` handle. A host
//! that cannot be resolved is not an error at all: the dispatcher turns it
//! into a synthetic 404 response.

use thiserror::Error;

/// Errors produced while building, dispatching or reading a request.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The text does not name any method in the catalog.
    #[error("unknown request method «{0}»")]
    UnknownMethod(String),

    /// The target could not be turned into an absolute network address.
    #[error("couldn't parse «{target}» to a URL: {reason}")]
    InvalidUrl { target: String, reason: String },

    /// The exchange failed for a reason other than host resolution.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The background worker panicked or was cancelled before producing a response.
    #[error("fetch task failed: {0}")]
    Task(String),

    /// The TLS client configuration could not be built.
    #[error("couldn't set up TLS: {0}")]
    Tls(String),

    /// The shared worker runtime could not be started.
    #[error("couldn't start fetch runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// The response body is not the JSON the caller asked for.
    #[error("deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FetchError>;
