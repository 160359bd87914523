use thiserror::Error;

/// Result type for reservation store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

/// Errors raised while reading a segment format from its textual shape.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("format must not be empty")]
    Empty,
    #[error("invalid symbol '{symbol}' in format '{format}'")]
    InvalidSymbol { symbol: char, format: String },
    #[error("format width {width} exceeds the maximum of {max}")]
    TooWide { width: usize, max: usize },
}

/// Errors surfaced to callers of the reservation operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReservationError {
    /// Not enough unused values remain to satisfy the request.
    #[error("cannot reserve {requested} value(s): only {available} obtainable")]
    Exhausted { requested: usize, available: usize },
    /// A contextual segment needs a variable the caller did not supply.
    #[error("missing variable for contextual segment: {0}")]
    InvalidVariable(String),
    #[error("invalid reservation request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
