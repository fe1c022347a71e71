//! Input validation errors.

use thiserror::Error;

/// Malformed signature, observation, descriptor or policy input.
///
/// Fatal to the single call that produced it; the caller must fix the input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("signature vector is empty")]
    EmptyVector,

    #[error("signature vector too long: {len} features (max {max})")]
    VectorTooLong { len: usize, max: usize },

    #[error("signature feature {index} is not finite")]
    NonFiniteFeature { index: usize },

    #[error("{field} must be within [0, 1], got {value}")]
    ConfidenceOutOfRange { field: &'static str, value: f64 },

    #[error("quality for engine '{engine}' must be within (0, 1], got {value}")]
    QualityOutOfRange { engine: String, value: f64 },

    #[error("engine '{engine}' is not ranked by the quality policy")]
    UnrankedEngine { engine: String },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("invalid bounding box: {reason}")]
    InvalidBBox { reason: String },

    #[error("unknown pattern category '{value}'")]
    UnknownCategory { value: String },

    #[error("unsupported signature encoding version {version}")]
    UnsupportedVersion { version: u8 },

    #[error("malformed signature blob: {reason}")]
    MalformedBlob { reason: String },

    #[error("malformed engine quality policy: {reason}")]
    MalformedPolicy { reason: String },

    #[error("malformed page descriptor: {reason}")]
    MalformedDescriptor { reason: String },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Checks that `value` is a finite number within `[0, 1]`.
pub(crate) fn check_unit(field: &'static str, value: f64) -> ValidationResult<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::ConfidenceOutOfRange { field, value })
    }
}
