//! Unified error handling for jelly-requester
//!
//! The store reports exactly two failure signals to its callers: an ordinal
//! that resolved to nothing, and a storage failure. Everything above the
//! store folds into [`AppError`].

use std::fmt;

/// Errors produced by the request store
#[derive(Debug)]
pub enum StoreError {
    /// The ordinal does not address any currently pending request
    NotFound(i64),

    /// The backing transaction failed and was rolled back
    Storage(heed::Error),

    /// A persisted value does not decode to a status flag
    Corrupted(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(ordinal) => write!(f, "No pending request at position {ordinal}"),
            StoreError::Storage(err) => write!(f, "Storage failure: {err}"),
            StoreError::Corrupted(msg) => write!(f, "Storage failure: corrupted entry {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<heed::Error> for StoreError {
    fn from(err: heed::Error) -> Self {
        StoreError::Storage(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Storage(heed::Error::Io(err))
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced during startup and while serving interactions
#[derive(Debug)]
pub enum AppError {
    /// Configuration-related errors
    Configuration(String),

    /// I/O errors on the interaction stream or log file
    Io(std::io::Error),

    /// Request store errors
    Store(StoreError),

    /// Internal system errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            AppError::Io(err) => write!(f, "I/O error: {err}"),
            AppError::Store(err) => write!(f, "Store error: {err}"),
            AppError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            AppError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

/// Result type alias for application operations
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> AppResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> AppResult<T> {
        self.map_err(|e| AppError::Internal(format!("{context}: {e}")))
    }
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::error::AppError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::AppError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::core::error::AppError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::AppError::Internal(format!($fmt, $($arg)*))
    };
}
