//! Error types for plugwire.

use thiserror::Error;

use crate::wire::WireError;

/// Main error type for all plugwire operations.
#[derive(Debug, Error)]
pub enum PlugwireError {
    /// A plugin, capability, component, or wire type tag is not registered.
    #[error("not found: {0}")]
    NotFound(String),

    /// No argument matched a required type during mapping.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// Non-waiting checkout on a cache key whose lock is already held.
    #[error("cache entry `{0}' is locked")]
    LockContention(String),

    /// Inbound call metadata lacked a required field.
    #[error("call metadata missing required field `{0}'")]
    MissingMetadata(&'static str),

    /// Broker did not receive connection info for a stream in time.
    #[error("timed out waiting for connection info for stream `{0}'")]
    StreamTimeout(String),

    /// Transport-level failure reported by the channel or connector.
    #[error("transport error: {0}")]
    Transport(String),

    /// MsgPack payload encode error.
    #[error("payload encode error: {0}")]
    PayloadEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack payload decode error.
    #[error("payload decode error: {0}")]
    PayloadDecode(#[from] rmp_serde::decode::Error),

    /// JSON serialization error (diagnostics only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error surfaced by a transport implementation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error already expressed in wire-protocol form.
    ///
    /// The exception guard passes these through unmodified.
    #[error("remote error: {}", .0.message)]
    Remote(WireError),
}

/// Result type alias using PlugwireError.
pub type Result<T> = std::result::Result<T, PlugwireError>;
