//! Error type shared by the distribution model and the sampler.

use crate::distributions::DistKind;
use thiserror::Error;

/// Everything that can go wrong when building a model or running a chain.
///
/// All variants are detected synchronously at the offending call and are
/// never retried internally.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// The family is declared in [`DistKind`] but has no implementation.
    #[error("unsupported distribution kind: {0:?}")]
    UnsupportedKind(DistKind),

    /// A scalar argument is outside its valid range.
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// The literal parameter list does not match the family's arity.
    #[error("{kind:?} takes {expected} parameters, got {actual}")]
    ArityMismatch {
        kind: DistKind,
        expected: usize,
        actual: usize,
    },

    /// A dependency was attached to a parameter slot that does not exist.
    #[error("dependency index {index} out of range for {arity} parameters")]
    DependencyIndex { index: usize, arity: usize },

    /// The sampler needs at least one observation.
    #[error("no observations supplied")]
    EmptyData,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Reject anything that is not a finite, strictly positive scale.
pub(crate) fn check_scale(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::InvalidParameter { name, value })
    }
}

pub(crate) fn check_finite(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::InvalidParameter { name, value })
    }
}
