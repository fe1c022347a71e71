use serde::{Deserialize, Serialize};

use crate::constants::{MAX_SIGNATURE_DIM, SIGNATURE_VERSION};
use crate::hashing::hash_features;
use crate::model::{ValidationError, ValidationResult};

/// Checks the length and finiteness invariants shared by stored and query vectors.
pub fn validate_features(features: &[f32]) -> ValidationResult<()> {
    if features.is_empty() {
        return Err(ValidationError::EmptyVector);
    }
    if features.len() > MAX_SIGNATURE_DIM {
        return Err(ValidationError::VectorTooLong {
            len: features.len(),
            max: MAX_SIGNATURE_DIM,
        });
    }
    if let Some(index) = features.iter().position(|v| !v.is_finite()) {
        return Err(ValidationError::NonFiniteFeature { index });
    }
    Ok(())
}

/// Versioned structural fingerprint of a page: 1..=100 finite features plus a content hash.
///
/// Fields are private so every instance upholds the length/finiteness invariants.
/// The hash is the dedup key for patterns within a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SignatureRepr")]
pub struct SignatureVector {
    version: u8,
    features: Vec<f32>,
    hash: String,
}

#[derive(Deserialize)]
struct SignatureRepr {
    version: u8,
    features: Vec<f32>,
    hash: String,
}

impl TryFrom<SignatureRepr> for SignatureVector {
    type Error = ValidationError;

    fn try_from(repr: SignatureRepr) -> Result<Self, Self::Error> {
        if repr.version != SIGNATURE_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                version: repr.version,
            });
        }
        Self::with_hash(repr.features, repr.hash)
    }
}

impl SignatureVector {
    /// Builds a signature and derives its hash from the features.
    pub fn new(features: Vec<f32>) -> ValidationResult<Self> {
        validate_features(&features)?;
        let hash = hash_features(SIGNATURE_VERSION, &features);
        Ok(Self {
            version: SIGNATURE_VERSION,
            features,
            hash,
        })
    }

    /// Builds a signature with a caller-supplied hash (e.g. computed upstream).
    pub fn with_hash(features: Vec<f32>, hash: impl Into<String>) -> ValidationResult<Self> {
        validate_features(&features)?;
        let hash = hash.into();
        if hash.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "signature hash",
            });
        }
        Ok(Self {
            version: SIGNATURE_VERSION,
            features,
            hash,
        })
    }

    #[inline]
    pub fn version(&self) -> u8 {
        self.version
    }

    #[inline]
    pub fn features(&self) -> &[f32] {
        &self.features
    }

    #[inline]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.features.len()
    }

    /// Storage encoding: one version byte followed by little-endian `f32` features.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.features.len() * 4);
        bytes.push(self.version);
        bytes.extend(self.features.iter().flat_map(|v| v.to_le_bytes()));
        bytes
    }

    /// Decodes a blob written by [`to_blob`](Self::to_blob).
    pub fn from_blob(bytes: &[u8], hash: impl Into<String>) -> ValidationResult<Self> {
        let (&version, body) = bytes
            .split_first()
            .ok_or_else(|| ValidationError::MalformedBlob {
                reason: "empty blob".to_string(),
            })?;
        if version != SIGNATURE_VERSION {
            return Err(ValidationError::UnsupportedVersion { version });
        }
        if !body.len().is_multiple_of(4) {
            return Err(ValidationError::MalformedBlob {
                reason: format!("{} payload bytes is not a whole number of f32", body.len()),
            });
        }
        let features = body
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Self::with_hash(features, hash)
    }
}
