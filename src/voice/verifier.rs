//! Speaker verification against the stored Boss profile

use super::embedding::cosine_similarity;
use super::extractor::EmbeddingExtractor;
use super::store::VoiceProfileStore;
use super::VoiceResult;
use crate::audio::AudioInput;
use serde::{Deserialize, Serialize};

/// What to report when verification cannot reach a decision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyPolicy {
    /// Treat every speaker as the Boss until a profile exists
    pub allow_when_not_enrolled: bool,
    /// Treat the speaker as the Boss when extraction or comparison fails
    pub allow_on_error: bool,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            allow_when_not_enrolled: true,
            allow_on_error: true,
        }
    }
}

impl VerifyPolicy {
    pub fn is_fail_open(&self) -> bool {
        self.allow_when_not_enrolled || self.allow_on_error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    NotEnrolled,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub is_boss: bool,
    /// Cosine similarity, or a fixed value when no comparison happened
    pub confidence: f32,
    pub threshold: f32,
    pub status: VerificationStatus,
    pub message: String,
}

/// Decides whether an utterance belongs to the Boss
#[derive(Debug, Clone, Default)]
pub struct SpeakerVerifier {
    policy: VerifyPolicy,
}

impl SpeakerVerifier {
    pub fn new(policy: VerifyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &VerifyPolicy {
        &self.policy
    }

    /// Verify `input`. Failures are folded into the result, never returned.
    pub fn verify(
        &self,
        extractor: &EmbeddingExtractor,
        store: &VoiceProfileStore,
        input: &AudioInput,
    ) -> VerificationResult {
        let config = store.load();
        let threshold = config.similarity_threshold;

        if !store.is_enrolled() {
            return VerificationResult {
                is_boss: self.policy.allow_when_not_enrolled,
                confidence: 1.0,
                threshold,
                status: VerificationStatus::NotEnrolled,
                message: "Voice recognition not set up yet".to_string(),
            };
        }

        match Self::similarity(extractor, store, input) {
            Ok(similarity) => {
                let is_boss = similarity >= threshold;
                log::info!(
                    "[VOICE] Verification: score={:.3}, threshold={:.3}, result={}",
                    similarity,
                    threshold,
                    if is_boss { "BOSS" } else { "GUEST" }
                );
                VerificationResult {
                    is_boss,
                    confidence: similarity,
                    threshold,
                    status: VerificationStatus::Verified,
                    message: if is_boss {
                        "Boss identified!".to_string()
                    } else {
                        "Guest detected".to_string()
                    },
                }
            }
            Err(e) => {
                log::warn!("[VOICE] Voice verification error: {}", e);
                VerificationResult {
                    is_boss: self.policy.allow_on_error,
                    confidence: 0.0,
                    threshold,
                    status: VerificationStatus::Error,
                    message: e.to_string(),
                }
            }
        }
    }

    fn similarity(
        extractor: &EmbeddingExtractor,
        store: &VoiceProfileStore,
        input: &AudioInput,
    ) -> VoiceResult<f32> {
        let incoming = extractor.embed(input)?;
        let profile = store.load_embedding()?;
        cosine_similarity(&incoming, &profile)
    }
}
