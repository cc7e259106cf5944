//! Error types for CSG operations.

use thiserror::Error;

/// Errors that can occur during CSG operations.
///
/// The three variants separate caller bugs from bad geometry:
///
/// - [`CsgError::InvalidInput`] - the caller violated an API contract
///   (e.g. an out-of-domain interpolation query). Not retryable.
/// - [`CsgError::GeometryInvalid`] - the input meshes are not valid at
///   the working tolerance (self-intersections, T-junctions, open
///   shells). Retryable after repairing or re-welding the input.
/// - [`CsgError::InvariantViolation`] - an internal data structure
///   failed a consistency check. Indicates a bug in the engine, not in
///   the input.
#[derive(Debug, Error)]
pub enum CsgError {
    /// Caller violated an API contract.
    #[error("invalid input: {details}")]
    InvalidInput {
        /// Description of the contract violation.
        details: String,
    },

    /// Input geometry is not valid at the working tolerance.
    #[error("geometrically invalid input: {details}")]
    GeometryInvalid {
        /// Description of the detected problem.
        details: String,
    },

    /// Internal consistency check failed.
    #[error("invariant violation: {details}")]
    InvariantViolation {
        /// Description of the failed check.
        details: String,
    },
}

impl CsgError {
    /// Shorthand for an [`CsgError::InvalidInput`] error.
    #[must_use]
    pub fn invalid_input(details: impl Into<String>) -> Self {
        Self::InvalidInput {
            details: details.into(),
        }
    }

    /// Shorthand for a [`CsgError::GeometryInvalid`] error.
    #[must_use]
    pub fn geometry(details: impl Into<String>) -> Self {
        Self::GeometryInvalid {
            details: details.into(),
        }
    }

    /// Shorthand for an [`CsgError::InvariantViolation`] error.
    #[must_use]
    pub fn invariant(details: impl Into<String>) -> Self {
        Self::InvariantViolation {
            details: details.into(),
        }
    }
}

/// Result type for CSG operations.
pub type CsgResult<T> = Result<T, CsgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CsgError::geometry("mesh is not manifold");
        assert_eq!(
            err.to_string(),
            "geometrically invalid input: mesh is not manifold"
        );
    }
}
