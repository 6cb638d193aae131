//! Error types for tntdriver
//!
//! Every failure surfaces as a single [`DriverError`]. Callers that need to
//! branch on the failure class use [`DriverError::kind`].

use thiserror::Error;

/// Message of the error returned when acquiring from a closed source.
pub const POOL_CLOSED: &str = "Pool is closed";

/// Message of the error returned when a lease is used after release.
pub const CONNECTION_CLOSED: &str = "Connection is closed";

/// Result type alias using DriverError
pub type Result<T> = std::result::Result<T, DriverError>;

/// Unified error type for driver operations
#[derive(Debug, Error)]
pub enum DriverError {
    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The session hit an I/O or protocol failure earlier and must be discarded.
    #[error("Connection is unusable after a previous failure: {0}")]
    Poisoned(String),

    #[error("{}", CONNECTION_CLOSED)]
    ConnectionClosed,

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Server Errors
    // -------------------------------------------------------------------------
    #[error("Server error {code}: {message}")]
    Remote { code: u32, message: String },

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Field {position}: expected {expected}, found {found}")]
    TypeMismatch {
        position: usize,
        expected: &'static str,
        found: String,
    },

    #[error("Row decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("{}", POOL_CLOSED)]
    PoolClosed,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`DriverError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Socket-level failure, fatal to the session
    Io,
    /// Desynchronised or malformed stream, fatal to the session
    Protocol,
    /// The server rejected the request; the session stays usable
    Remote,
    /// The caller broke a sequencing or typing rule
    Usage,
    /// Invalid configuration
    Config,
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::Io(_) | DriverError::Poisoned(_) => ErrorKind::Io,
            DriverError::Protocol(_) => ErrorKind::Protocol,
            DriverError::Remote { .. } => ErrorKind::Remote,
            DriverError::Usage(_)
            | DriverError::TypeMismatch { .. }
            | DriverError::Decode(_)
            | DriverError::PoolClosed
            | DriverError::ConnectionClosed => ErrorKind::Usage,
            DriverError::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether this failure leaves the session desynchronised.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Io | ErrorKind::Protocol)
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        DriverError::Protocol(message.into())
    }

    pub(crate) fn usage(message: impl Into<String>) -> Self {
        DriverError::Usage(message.into())
    }
}

// -----------------------------------------------------------------------------
// MessagePack conversions
// -----------------------------------------------------------------------------

impl From<rmp::encode::ValueWriteError> for DriverError {
    fn from(err: rmp::encode::ValueWriteError) -> Self {
        match err {
            rmp::encode::ValueWriteError::InvalidMarkerWrite(e)
            | rmp::encode::ValueWriteError::InvalidDataWrite(e) => DriverError::Io(e),
        }
    }
}

impl From<rmp::decode::ValueReadError> for DriverError {
    fn from(err: rmp::decode::ValueReadError) -> Self {
        DriverError::Protocol(format!("malformed MessagePack: {}", err))
    }
}

impl From<rmp::decode::NumValueReadError> for DriverError {
    fn from(err: rmp::decode::NumValueReadError) -> Self {
        DriverError::Protocol(format!("malformed MessagePack integer: {}", err))
    }
}

impl From<rmpv::decode::Error> for DriverError {
    fn from(err: rmpv::decode::Error) -> Self {
        DriverError::Protocol(format!("malformed MessagePack value: {}", err))
    }
}
