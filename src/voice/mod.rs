//! Speaker verification for the Boss voice profile
//!
//! Audio is normalized, turned into an embedding by an ONNX speaker model,
//! and either accumulated into an enrollment or compared against the stored
//! profile by cosine similarity.

pub mod embedding;
pub mod encoder;
pub mod error;
pub mod extractor;
pub mod fbank;
pub mod service;
pub mod session;
pub mod store;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use encoder::{EncoderConfig, LazyEncoder, OnnxSpeakerEncoder, SpeakerEncoder};
pub use error::{VoiceError, VoiceResult};
pub use extractor::EmbeddingExtractor;
pub use service::VoiceService;
pub use session::{
    EnrollmentConfig, EnrollmentManager, EnrollmentProgress, EnrollmentResult, EnrollmentStarted,
    EnrollmentStatus,
};
pub use store::{VoiceConfig, VoiceProfileStore, VoiceStatus};
pub use verifier::{SpeakerVerifier, VerificationResult, VerificationStatus, VerifyPolicy};
