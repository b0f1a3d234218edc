//! Error taxonomy shared by transport backends and the locator.
//!
//! Most of these errors are *recovered* by the locator rather than surfaced:
//! a backend that cannot enumerate is skipped, a candidate that cannot
//! connect is discarded, and a brick that fails strict identity matching is
//! closed.  Only [`BrickError`] routinely reaches the caller.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::domain::method::BackendKind;

/// A transport backend could not enumerate candidates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The medium is absent or inaccessible (no USB permissions, no radio, ...).
    #[error("{backend} backend unavailable: {reason}")]
    Unavailable { backend: BackendKind, reason: String },

    /// Enumeration did not finish within the locator's deadline.
    #[error("{backend} enumeration timed out after {after:?}")]
    TimedOut { backend: BackendKind, after: Duration },
}

impl BackendError {
    /// Convenience constructor for [`BackendError::Unavailable`].
    pub fn unavailable(backend: BackendKind, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            backend,
            reason: reason.into(),
        }
    }
}

/// A specific candidate could not be opened.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("failed to connect to {candidate}: {reason}")]
    Failed { candidate: String, reason: String },

    #[error("connecting to {candidate} timed out after {after:?}")]
    TimedOut { candidate: String, after: Duration },
}

impl ConnectError {
    /// Convenience constructor for [`ConnectError::Failed`].
    pub fn failed(candidate: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            candidate: candidate.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by an open (or formerly open) brick connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrickError {
    /// The connection has been closed; it cannot be reused.
    #[error("brick connection is closed")]
    Closed,

    /// The transport failed while exchanging a command with the brick.
    #[error("brick I/O error: {0}")]
    Io(String),

    /// The brick answered with a non-success status.
    #[error("brick rejected command: {0}")]
    Rejected(String),
}

/// Which part of the identity failed strict matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Host,
    Name,
}

impl fmt::Display for IdentityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityField::Host => f.write_str("host"),
            IdentityField::Name => f.write_str("name"),
        }
    }
}

/// A connected brick reported an identity that does not satisfy a strict filter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field} mismatch: wanted {expected:?}, brick reported {reported:?}")]
pub struct IdentityMismatch {
    pub field: IdentityField,
    pub expected: String,
    pub reported: String,
}

/// A configuration field held a value outside its accepted vocabulary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid value {value:?} for config field `{field}`")]
pub struct ConfigFormatError {
    pub field: String,
    pub value: String,
}

impl ConfigFormatError {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}
