//! Status codes shared by every public entry point.

use std::io;

/// Every fallible operation in the crate resolves to one of these.
/// The core never panics on caller input.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    /// Caller error: bad geometry, out-of-range parameter, non-empty target.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Capacity or arithmetic overflow while sizing an allocation.
    #[error("allocation failed: {0}")]
    AllocationFailed(&'static str),
    /// Underlying file read/write failure, including truncation.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Corrupt or unknown container data.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(&'static str),
    /// The generator could not satisfy the request within its budget.
    #[error("generation failed: {0}")]
    GenerationFailed(&'static str),
}

impl GenError {
    /// Stable integer code, matching the serialized status convention.
    pub fn code(&self) -> i32 {
        match self {
            GenError::InvalidArgument(_) => 1,
            GenError::AllocationFailed(_) => 2,
            GenError::Io(_) => 3,
            GenError::UnsupportedFormat(_) => 4,
            GenError::GenerationFailed(_) => 5,
        }
    }

    /// Recoverable at the orchestrator level (retried with a shifted seed).
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenError::GenerationFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(GenError::InvalidArgument("x").code(), 1);
        assert_eq!(GenError::AllocationFailed("x").code(), 2);
        assert_eq!(GenError::UnsupportedFormat("x").code(), 4);
        assert_eq!(GenError::GenerationFailed("x").code(), 5);
    }

    #[test]
    fn test_only_generation_failures_retry() {
        assert!(GenError::GenerationFailed("budget").is_retryable());
        assert!(!GenError::InvalidArgument("width").is_retryable());
        assert!(!GenError::UnsupportedFormat("magic").is_retryable());
    }
}
