//! Error types for hybrid Bayes net operations.

use thiserror::Error;

use crate::keys::Key;

/// Errors that can occur while building or querying hybrid models.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// without breaking changes. Every public fallible operation returns
/// `Result<T, HybridError>`; nothing is retried or defaulted internally.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HybridError {
    /// A discrete value was required but the caller did not supply it.
    #[error("missing discrete assignment for key {key}")]
    MissingDiscreteAssignment { key: Key },

    /// A continuous value was required but the caller did not supply it.
    #[error("missing continuous value for key {key}")]
    MissingKey { key: Key },

    /// The frontal block of a Gaussian conditional cannot be solved.
    #[error("underdetermined system: frontal block of conditional on {key} is singular")]
    UnderdeterminedSystem { key: Key },

    /// A mixture component removed by pruning was selected.
    #[error("mixture component on {key} was pruned and cannot be selected")]
    PrunedBranch { key: Key },

    /// Vector or matrix shapes do not agree.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// A discrete value lies outside its key's domain.
    #[error("value {value} out of range for key {key} with cardinality {cardinality}")]
    InvalidAssignment {
        key: Key,
        value: usize,
        cardinality: usize,
    },

    /// The Bayes-net ordering or key-kind invariant is violated.
    #[error("invalid structure: {0}")]
    InvalidStructure(String),

    /// A constructor or configuration argument is invalid.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Numerical stability error (NaN/Inf, invalid probabilities).
    #[error("numerical error: {0}")]
    Numerical(String),
}

impl HybridError {
    pub(crate) fn dimension(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        HybridError::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}
