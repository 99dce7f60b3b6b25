//! Convenience result type alias for StatJob.

use crate::error::AppError;

/// A specialized `Result` type for StatJob operations.
pub type AppResult<T> = Result<T, AppError>;
