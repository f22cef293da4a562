use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the voice recognition core
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Audio too short for voice embedding: {samples} samples (minimum {min})")]
    AudioTooShort { samples: usize, min: usize },

    #[error("Audio file not found: {0}")]
    AudioNotFound(PathBuf),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Transcoding failed: {0}")]
    Transcode(String),

    #[error("Embedding extraction failed: {0}")]
    Extraction(String),

    #[error("Speaker model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("No active enrollment session")]
    NoActiveSession,

    #[error("Need at least {need} samples, only have {have}")]
    InsufficientSamples { have: usize, need: usize },

    #[error("Threshold must be between 0.5 and 0.95, got {0}")]
    InvalidThreshold(f32),

    #[error("Voice profile storage is corrupt: {0}")]
    StorageCorruption(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    /// Stable machine-readable code for the outer conversational layer
    pub fn code(&self) -> &'static str {
        match self {
            VoiceError::AudioTooShort { .. } => "audio_too_short",
            VoiceError::AudioNotFound(_) => "audio_not_found",
            VoiceError::Decode(_) => "decode_failed",
            VoiceError::Transcode(_) => "transcode_failed",
            VoiceError::Extraction(_) => "extraction_failed",
            VoiceError::ModelUnavailable(_) => "model_unavailable",
            VoiceError::NoActiveSession => "no_active_session",
            VoiceError::InsufficientSamples { .. } => "insufficient_samples",
            VoiceError::InvalidThreshold(_) => "invalid_threshold",
            VoiceError::StorageCorruption(_) => "storage_corruption",
            VoiceError::Io(_) => "io_error",
        }
    }
}

pub type VoiceResult<T> = std::result::Result<T, VoiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(VoiceError::NoActiveSession.code(), "no_active_session");
        assert_eq!(
            VoiceError::InsufficientSamples { have: 2, need: 20 }.code(),
            "insufficient_samples"
        );
        assert_eq!(VoiceError::InvalidThreshold(0.3).code(), "invalid_threshold");
    }

    #[test]
    fn test_insufficient_samples_message() {
        let err = VoiceError::InsufficientSamples { have: 7, need: 20 };
        assert_eq!(err.to_string(), "Need at least 20 samples, only have 7");
    }
}
