//! # Store errors
//!
//! Every store call reports failures through one tagged error, so callers
//! branch on the variant instead of inspecting codes or messages:
//! - `NotFound` and `AlreadyExists` are the two benign outcomes that
//!   convergence code folds back into data
//! - `Conflict` reports a stale expected version on a conditional write
//! - the rest are infrastructure failures the caller retries

use thiserror::Error;

use crate::resources::ObjectKind;

/// A convenience result type for store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// HTTP-ish classification of a store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,   // 400
    Forbidden,    // 403
    NotFound,     // 404
    Timeout,      // 408
    Conflict,     // 409 (stale version)
    AlreadyExists, // 409 (duplicate create)
    GeneralError, // 500
    Unavailable,  // 503
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Timeout => 408,
            ErrorKind::Conflict | ErrorKind::AlreadyExists => 409,
            ErrorKind::GeneralError => 500,
            ErrorKind::Unavailable => 503,
        }
    }

    /// Reason name, e.g. "NotFound".
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::GeneralError => "GeneralError",
            ErrorKind::Unavailable => "Unavailable",
        }
    }
}

/// Errors returned by an [`ObjectStore`](crate::store::ObjectStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} {name} not found")]
    NotFound { kind: ObjectKind, name: String },

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: ObjectKind, name: String },

    #[error("{kind} {name} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        kind: ObjectKind,
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Store call timed out: {0}")]
    Timeout(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn conflict(kind: ObjectKind, name: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::Conflict {
            kind,
            name: name.into(),
            expected,
            actual,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            StoreError::Invalid(_) => ErrorKind::BadRequest,
            StoreError::Forbidden(_) => ErrorKind::Forbidden,
            StoreError::Timeout(_) => ErrorKind::Timeout,
            StoreError::Unavailable(_) => ErrorKind::Unavailable,
            StoreError::Internal(_) => ErrorKind::GeneralError,
        }
    }

    pub fn code(&self) -> u16 {
        self.kind().status_code()
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Whether re-running the pass later can succeed.
    ///
    /// `Invalid` means the request itself is malformed and will fail again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StoreError::Invalid(_))
    }
}

/// Folds the benign store outcomes into data.
pub trait StoreResultExt<T> {
    /// `NotFound` becomes `Ok(None)`; every other error is kept.
    fn found(self) -> StoreResult<Option<T>>;

    /// `AlreadyExists` becomes `Ok(None)`; every other error is kept.
    fn or_existing(self) -> StoreResult<Option<T>>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn found(self) -> StoreResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn or_existing(self) -> StoreResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_already_exists() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Convenience helper for "bail with StoreError".
#[macro_export]
macro_rules! bail_store {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::StoreError::$ctor($msg))
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::StoreError::$ctor(format!($fmt, $($arg)*)))
    };
}
