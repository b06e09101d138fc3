//! Error types for conisub.
//!
//! Numerical failures inside the subdivision pipeline (a degenerate fit, a
//! ray that misses its conic) are not errors: they are reported through
//! [`Conic::is_valid`](crate::algo::conic::Conic::is_valid) and `Option`
//! returns and recovered locally. [`CurveError`] covers caller mistakes and
//! malformed input data.

use thiserror::Error;

/// Result type alias using [`CurveError`].
pub type Result<T> = std::result::Result<T, CurveError>;

/// Errors that can occur during curve operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurveError {
    /// A vertex index is outside the curve.
    #[error("vertex index {index} out of range for curve of length {len}")]
    InvalidIndex {
        /// The offending index.
        index: usize,
        /// Length of the curve.
        len: usize,
    },

    /// Vertex and normal lists have different lengths.
    #[error("curve has {vertices} vertices but {normals} normals")]
    LengthMismatch {
        /// Number of vertices supplied.
        vertices: usize,
        /// Number of normals supplied.
        normals: usize,
    },

    /// A supplied normal is zero or not finite.
    #[error("normal at vertex {index} is zero or not finite")]
    DegenerateNormal {
        /// The vertex index.
        index: usize,
    },

    /// A supplied vertex has a NaN or infinite coordinate.
    #[error("vertex {index} has a non-finite coordinate")]
    NonFiniteVertex {
        /// The vertex index.
        index: usize,
    },

    /// Normal refinement was cancelled by the caller.
    #[error("normal refinement was cancelled")]
    Cancelled,

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl CurveError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        CurveError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
        if index < len {
            Ok(())
        } else {
            Err(CurveError::InvalidIndex { index, len })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CurveError::InvalidIndex { index: 7, len: 3 };
        assert_eq!(err.to_string(), "vertex index 7 out of range for curve of length 3");

        let err = CurveError::invalid_param("patch_size", 0, "must be at least 1");
        assert_eq!(err.to_string(), "invalid parameter: patch_size = 0 (must be at least 1)");
    }

    #[test]
    fn test_check_index() {
        assert!(CurveError::check_index(2, 3).is_ok());
        assert_eq!(
            CurveError::check_index(3, 3),
            Err(CurveError::InvalidIndex { index: 3, len: 3 })
        );
    }
}
