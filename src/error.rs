//! Error types for tacit

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using tacit's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tacit operations
///
/// Every variant describes a contract violation detected synchronously at the
/// call that raised it. The failing operation leaves the tensor's staging
/// flags untouched, so the stage can be retried once the cause is fixed.
#[derive(Error, Debug)]
pub enum Error {
    /// Coordinate length does not match the tensor order
    #[error("Wrong number of indices for tensor '{tensor}': expected {expected}, got {got}")]
    ArityMismatch {
        /// Tensor name
        tensor: String,
        /// Tensor order
        expected: usize,
        /// Coordinate length
        got: usize,
    },

    /// Extents or array lengths disagree
    #[error("Shape mismatch for tensor '{tensor}': expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Tensor name
        tensor: String,
        /// Expected extents
        expected: Vec<usize>,
        /// Actual extents
        got: Vec<usize>,
    },

    /// Element type of a value or view does not match the tensor
    #[error("Type mismatch for tensor '{tensor}': tensor has component type {expected}, got {got}")]
    DTypeMismatch {
        /// Tensor name
        tensor: String,
        /// Declared component type
        expected: DType,
        /// Requested type
        got: DType,
    },

    /// Operation requires a specific storage format
    #[error("The tensor '{tensor}' is not defined in the {expected} format (format is {got})")]
    FormatMismatch {
        /// Tensor name
        tensor: String,
        /// Required format
        expected: String,
        /// Actual format
        got: String,
    },

    /// Operation requires a tensor with exactly two modes
    #[error("Operation on tensor '{tensor}' requires a matrix, got order {order}")]
    RequiresMatrix {
        /// Tensor name
        tensor: String,
        /// Actual order
        order: usize,
    },

    /// Coordinate outside the extent of its mode
    #[error("Index {index} out of bounds for mode {mode} of tensor '{tensor}' with size {size}")]
    IndexOutOfBounds {
        /// Tensor name
        tensor: String,
        /// Mode that was indexed
        mode: usize,
        /// The invalid index
        index: i64,
        /// Extent of the mode
        size: usize,
    },

    /// Assignment would create a dependency cycle between tensors
    #[error("Assignment to '{tensor}' reads '{operand}', which already depends on '{tensor}'")]
    CyclicDependency {
        /// Tensor being assigned
        tensor: String,
        /// Operand closing the cycle
        operand: String,
    },

    /// Handle refers to a released tensor
    #[error("Stale tensor handle {id}")]
    StaleHandle {
        /// Display form of the handle
        id: String,
    },

    /// Tensor is still read by another tensor's pending assignment
    #[error("Tensor '{tensor}' is still an operand of the assignment to '{by}'")]
    StillReferenced {
        /// Tensor being released
        tensor: String,
        /// Tensor whose assignment reads it
        by: String,
    },

    /// Unsupported dtype for an operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// DType needs a cargo feature that is not enabled
    #[error("DType {dtype:?} requires the '{feature}' feature")]
    FeatureRequired {
        /// The dtype
        dtype: DType,
        /// Feature name
        feature: &'static str,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Code generator failed to build a module
    #[error("Code generation error: {0}")]
    Codegen(String),

    /// Malformed tensor file
    #[error("Parse error on line {line}: {reason}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong
        reason: String,
    },

    /// I/O failure while reading or writing tensors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Feature not yet implemented
    #[error("Not implemented: {feature}")]
    NotImplemented {
        /// Description of the unimplemented feature
        feature: &'static str,
    },
}

impl Error {
    /// Create an arity mismatch error
    pub fn arity_mismatch(tensor: &str, expected: usize, got: usize) -> Self {
        Self::ArityMismatch {
            tensor: tensor.to_string(),
            expected,
            got,
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(tensor: &str, expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            tensor: tensor.to_string(),
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create a dtype mismatch error
    pub fn dtype_mismatch(tensor: &str, expected: DType, got: DType) -> Self {
        Self::DTypeMismatch {
            tensor: tensor.to_string(),
            expected,
            got,
        }
    }

    /// Create a format mismatch error
    pub fn format_mismatch(tensor: &str, expected: impl ToString, got: impl ToString) -> Self {
        Self::FormatMismatch {
            tensor: tensor.to_string(),
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    /// Create an unsupported dtype error
    pub fn unsupported_dtype(dtype: DType, op: &'static str) -> Self {
        Self::UnsupportedDType { dtype, op }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_tensor() {
        let err = Error::arity_mismatch("A", 2, 3);
        assert_eq!(
            err.to_string(),
            "Wrong number of indices for tensor 'A': expected 2, got 3"
        );

        let err = Error::dtype_mismatch("B", DType::F64, DType::I32);
        assert!(err.to_string().contains("'B'"));
        assert!(err.to_string().contains("f64"));
        assert!(err.to_string().contains("i32"));

        let err = Error::format_mismatch("C", "CSR", "(s,s)");
        assert!(err.to_string().contains("CSR"));
    }
}
