use blake3::Hasher;

/// Quantisation step applied to features before hashing.
///
/// Two signatures whose features agree to four decimal places hash identically, so float
/// noise from the layout analyzer does not split one pattern into many.
pub const FEATURE_QUANTUM: f64 = 1e-4;

#[inline]
fn quantize(value: f32) -> i64 {
    (f64::from(value) / FEATURE_QUANTUM).round() as i64
}

/// Content hash of a signature: BLAKE3 over the encoding version, the feature count and
/// the quantised features, hex encoded.
///
/// Deterministic for identical input; the version prefix keeps hashes from different
/// feature layouts from colliding.
pub fn hash_features(version: u8, features: &[f32]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(&[version]);
    hasher.update(&(features.len() as u32).to_le_bytes());
    for &value in features {
        hasher.update(&quantize(value).to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Short fingerprint for log lines.
#[inline]
pub fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hash_features_determinism() {
        let features = [0.5_f32, 0.25, 0.125, 1.0];

        let hash1 = hash_features(1, &features);
        let hash2 = hash_features(1, &features);
        let hash3 = hash_features(1, &features);

        assert_eq!(hash1, hash2);
        assert_eq!(hash2, hash3);
    }

    #[test]
    fn test_hash_features_uniqueness() {
        let inputs: [&[f32]; 4] = [
            &[0.5, 0.5, 0.5],
            &[0.5, 0.5, 0.51],
            &[0.5, 0.5],
            &[0.5, 0.5, 0.5, 0.0],
        ];

        let hashes: Vec<_> = inputs.iter().map(|f| hash_features(1, f)).collect();
        let unique_hashes: HashSet<_> = hashes.iter().collect();

        assert_eq!(unique_hashes.len(), inputs.len());
    }

    #[test]
    fn test_hash_features_version_sensitivity() {
        let features = [0.1_f32, 0.2, 0.3];
        assert_ne!(hash_features(1, &features), hash_features(2, &features));
    }

    #[test]
    fn test_hash_features_absorbs_sub_quantum_noise() {
        let a = [0.3_f32, 0.7];
        let b = [0.300_001_f32, 0.699_999];
        assert_eq!(hash_features(1, &a), hash_features(1, &b));
    }

    #[test]
    fn test_hash_features_output_is_hex() {
        let hash = hash_features(1, &[0.0]);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_short_hash() {
        let hash = hash_features(1, &[0.42]);
        assert_eq!(short_hash(&hash), &hash[..12]);
        assert_eq!(short_hash("abc"), "abc");
    }
}
