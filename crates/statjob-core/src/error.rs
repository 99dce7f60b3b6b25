//! Unified application error types for StatJob.
//!
//! The record store and the queue surface every failure as an [`AppError`]
//! whose [`ErrorKind`] lets callers tell protocol misuse apart from
//! storage trouble. Nothing in the core retries internally.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// No record document exists for the job.
    NotFound,
    /// The record document cannot be parsed or violates the current schema.
    CorruptRecord,
    /// A job with the same identifier already exists.
    Conflict,
    /// The job already has an entry in `queued/` or `claimed/`.
    DuplicateEnqueue,
    /// The claim's entry is gone (already acknowledged or requeued).
    DuplicateAck,
    /// The claim was not issued by this queue.
    UnknownClaim,
    /// A status change outside the job state machine (hardening layer only).
    InvalidTransition,
    /// An identifier is empty, too long, or unsafe as a filename.
    InvalidId,
    /// An exclusive file lock could not be acquired.
    Lock,
    /// A filesystem I/O error occurred.
    Storage,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// A configuration error occurred.
    Configuration,
    /// The analysis engine failed to run.
    Engine,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::CorruptRecord => write!(f, "CORRUPT_RECORD"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::DuplicateEnqueue => write!(f, "DUPLICATE_ENQUEUE"),
            Self::DuplicateAck => write!(f, "DUPLICATE_ACK"),
            Self::UnknownClaim => write!(f, "UNKNOWN_CLAIM"),
            Self::InvalidTransition => write!(f, "INVALID_TRANSITION"),
            Self::InvalidId => write!(f, "INVALID_ID"),
            Self::Lock => write!(f, "LOCK"),
            Self::Storage => write!(f, "STORAGE"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Engine => write!(f, "ENGINE"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified application error used throughout StatJob.
///
/// Crate-specific failures are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls, so `?` works across crate boundaries.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a corrupt-record error.
    pub fn corrupt_record(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CorruptRecord, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a duplicate-enqueue error.
    pub fn duplicate_enqueue(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateEnqueue, message)
    }

    /// Create a duplicate-ack error.
    pub fn duplicate_ack(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateAck, message)
    }

    /// Create an unknown-claim error.
    pub fn unknown_claim(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownClaim, message)
    }

    /// Create an invalid-transition error.
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidTransition, message)
    }

    /// Create an invalid-identifier error.
    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidId, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Engine, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Check whether this error has the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Storage, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
