//! Crate-level error types.
//!
//! [`DepthwatchError`] unifies every error source (analyzer input
//! validation, snapshot ingestion, configuration, HTTP, WebSocket, JSON and
//! publishing) behind a single enum so callers can match on the variant they
//! care about while still using the `?` operator for easy propagation.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DepthwatchError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum DepthwatchError {
    /// Analyzer arguments were rejected before any computation took place.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A raw order book level could not be turned into a valid price level.
    #[error("malformed level: {0}")]
    MalformedLevel(String),

    /// A depth update does not continue the local book's update sequence.
    #[error("order book out of sync: {0}")]
    OutOfSync(String),

    /// Configuration could not be read from the environment.
    #[error("configuration error: {0}")]
    Config(String),

    /// An HTTP request to the exchange or messaging API failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A message received from a remote endpoint had an unexpected shape.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The messaging endpoint refused or failed to deliver a message.
    #[error("publish error: {0}")]
    Publish(String),
}
