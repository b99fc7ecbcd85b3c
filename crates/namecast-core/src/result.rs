//! Convenience result type alias for Namecast.

use crate::error::AppError;

/// A specialized `Result` type for Namecast operations.
pub type AppResult<T> = Result<T, AppError>;
