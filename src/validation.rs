/**
 * Input Validation Module
 *
 * Centralized validation for caller-supplied values: thresholds, sample
 * counts and audio file paths.
 */
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Lowest accepted similarity threshold
pub const MIN_SIMILARITY_THRESHOLD: f32 = 0.5;

/// Highest accepted similarity threshold
pub const MAX_SIMILARITY_THRESHOLD: f32 = 0.95;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Validate similarity threshold (0.5 to 0.95)
pub fn validate_similarity_threshold(threshold: f32) -> Result<f32, ValidationError> {
    // NaN fails `contains`, so it is rejected here too
    if !(MIN_SIMILARITY_THRESHOLD..=MAX_SIMILARITY_THRESHOLD).contains(&threshold) {
        return Err(ValidationError::InvalidRange(format!(
            "Threshold must be between {} and {}, got {}",
            MIN_SIMILARITY_THRESHOLD, MAX_SIMILARITY_THRESHOLD, threshold
        )));
    }
    Ok(threshold)
}

/// Validate a required sample count (at least 1, at most 1000)
pub fn validate_sample_quota(count: usize) -> Result<usize, ValidationError> {
    if !(1..=1000).contains(&count) {
        return Err(ValidationError::InvalidRange(format!(
            "Sample quota must be between 1 and 1000, got {}",
            count
        )));
    }
    Ok(count)
}

/// Validate an audio file path supplied by the caller.
///
/// The path must be non-empty, contain no NUL byte and not name a directory.
/// A missing file passes; callers report it as their own "not found" error.
pub fn validate_audio_path(path: &Path) -> Result<PathBuf, ValidationError> {
    let raw = path.to_string_lossy();

    if raw.is_empty() {
        return Err(ValidationError::InvalidPath(
            "Path cannot be empty".to_string(),
        ));
    }

    if raw.contains('\0') {
        return Err(ValidationError::InvalidPath(
            "Path contains null byte".to_string(),
        ));
    }

    if path.is_dir() {
        return Err(ValidationError::InvalidFormat(format!(
            "Expected an audio file, got a directory: {}",
            path.display()
        )));
    }

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_similarity_threshold_valid() {
        assert!(validate_similarity_threshold(0.5).is_ok());
        assert!(validate_similarity_threshold(0.75).is_ok());
        assert!(validate_similarity_threshold(0.95).is_ok());
    }

    #[test]
    fn test_similarity_threshold_invalid() {
        assert!(validate_similarity_threshold(0.3).is_err());
        assert!(validate_similarity_threshold(0.99).is_err());
        assert!(validate_similarity_threshold(f32::NAN).is_err());
    }

    #[test]
    fn test_sample_quota() {
        assert!(validate_sample_quota(3).is_ok());
        assert!(validate_sample_quota(20).is_ok());
        assert!(validate_sample_quota(0).is_err());
        assert!(validate_sample_quota(1001).is_err());
    }

    #[test]
    fn test_audio_path_invalid() {
        assert!(validate_audio_path(Path::new("")).is_err());
        assert!(validate_audio_path(&env::temp_dir()).is_err()); // Directory
    }

    #[test]
    fn test_audio_path_missing_is_not_a_format_error() {
        // Missing files are reported by the extractor, not here
        let missing = env::temp_dir().join("fridai-definitely-missing.webm");
        assert!(validate_audio_path(&missing).is_ok());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn threshold_in_accepted_range(x in 0.5f32..=0.95) {
            assert!(validate_similarity_threshold(x).is_ok());
        }

        #[test]
        fn threshold_outside_accepted_range(x in any::<f32>().prop_filter("out of [0.5,0.95]", |v| *v < 0.5 || *v > 0.95)) {
            assert!(validate_similarity_threshold(x).is_err());
        }

        #[test]
        fn quota_in_valid_range(x in 1usize..=1000) {
            assert!(validate_sample_quota(x).is_ok());
        }
    }
}
