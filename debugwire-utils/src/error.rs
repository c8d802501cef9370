//! Error types for debugwire
//!
//! Provides a unified error type used across all debugwire crates. Variants
//! are grouped by where the failure originates: schema compilation, the
//! transport, or the remote side of the protocol.

use std::path::PathBuf;

/// Main error type for debugwire operations
#[derive(Debug, thiserror::Error)]
pub enum DebugwireError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Schema Errors ===

    #[error("Unresolved type reference '{reference}' in domain {domain}")]
    UnresolvedReference { domain: String, reference: String },

    #[error("Malformed descriptor {item}: {message}")]
    MalformedDescriptor { item: String, message: String },

    #[error("Duplicate domain: {0}")]
    DuplicateDomain(String),

    #[error("Failed to parse protocol description: {0}")]
    SchemaParse(String),

    // === Transport Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Connection timeout after {seconds}s")]
    ConnectionTimeout { seconds: u64 },

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Session closed")]
    SessionClosed,

    #[error("Failed to send frame: {0}")]
    SendFailed(String),

    // === Protocol Errors ===

    #[error("Remote error {code}: {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Failed to decode {method}: {message}")]
    Decode { method: String, message: String },

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Request cancelled")]
    Cancelled,

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DebugwireError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an invalid message error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::InvalidMessage(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a malformed descriptor error for a named schema item
    pub fn malformed(item: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MalformedDescriptor {
            item: item.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using DebugwireError
pub type Result<T> = std::result::Result<T, DebugwireError>;
