//! Boss enrollment: live sessions and one-shot bulk enrollment

use super::embedding::mean_embedding;
use super::extractor::EmbeddingExtractor;
use super::store::VoiceProfileStore;
use super::{VoiceError, VoiceResult};
use crate::audio::AudioInput;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Sample quotas for enrollment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    /// Samples a live session must collect before it can complete
    pub session_samples_min: usize,
    /// Successfully processed samples required by bulk enrollment
    pub bulk_samples_min: usize,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            session_samples_min: 20,
            bulk_samples_min: 3,
        }
    }
}

/// Returned when a session starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentStarted {
    pub samples_needed: usize,
    pub message: String,
}

/// Returned after each accepted sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentProgress {
    pub samples_collected: usize,
    /// Samples still missing before the session can complete
    pub samples_needed: usize,
    pub can_complete: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentStatus {
    pub active: bool,
    pub samples_collected: usize,
    pub samples_needed: usize,
    pub samples_required: usize,
    pub can_complete: bool,
    pub started_at: Option<String>,
}

/// Returned when a profile has been written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentResult {
    pub samples_used: usize,
    pub message: String,
}

#[derive(Debug, Default)]
enum EnrollmentSession {
    #[default]
    Inactive,
    Active {
        started_at: String,
        embeddings: Vec<Vec<f32>>,
    },
}

impl EnrollmentSession {
    fn collected(&self) -> usize {
        match self {
            EnrollmentSession::Inactive => 0,
            EnrollmentSession::Active { embeddings, .. } => embeddings.len(),
        }
    }
}

/// Owns the single enrollment session of a service
#[derive(Debug)]
pub struct EnrollmentManager {
    config: EnrollmentConfig,
    session: Mutex<EnrollmentSession>,
}

impl EnrollmentManager {
    pub fn new(config: EnrollmentConfig) -> Self {
        Self {
            config,
            session: Mutex::new(EnrollmentSession::Inactive),
        }
    }

    pub fn config(&self) -> &EnrollmentConfig {
        &self.config
    }

    /// Begin a new session, discarding any session in progress
    pub fn start(&self) -> EnrollmentStarted {
        let mut session = self.session.lock();

        if let EnrollmentSession::Active { embeddings, .. } = &*session {
            log::info!(
                "[VOICE ENROLL] Restarting session, discarding {} samples",
                embeddings.len()
            );
        }

        *session = EnrollmentSession::Active {
            started_at: chrono::Local::now().to_rfc3339(),
            embeddings: Vec::new(),
        };

        let needed = self.config.session_samples_min;
        log::info!("[VOICE ENROLL] Session started, {} samples needed", needed);

        EnrollmentStarted {
            samples_needed: needed,
            message: format!(
                "Enrollment session started. Please provide {} voice samples by talking to me normally.",
                needed
            ),
        }
    }

    /// Extract and append one sample.
    ///
    /// The session lock is held during extraction. A failed extraction is
    /// returned to the caller and leaves the collected samples untouched.
    pub fn add_sample(
        &self,
        extractor: &EmbeddingExtractor,
        input: &AudioInput,
    ) -> VoiceResult<EnrollmentProgress> {
        let mut session = self.session.lock();

        let EnrollmentSession::Active { embeddings, .. } = &mut *session else {
            return Err(VoiceError::NoActiveSession);
        };

        let embedding = extractor.embed(input).map_err(|e| {
            log::warn!("[VOICE ENROLL] Error adding sample: {}", e);
            e
        })?;
        embeddings.push(embedding);

        let required = self.config.session_samples_min;
        let count = embeddings.len();
        let remaining = required.saturating_sub(count);
        let can_complete = count >= required;

        let message = if can_complete {
            format!(
                "Sample {} recorded! You have enough samples - tell me to complete enrollment when ready.",
                count
            )
        } else {
            format!(
                "Sample {}/{} recorded. {} more needed.",
                count, required, remaining
            )
        };
        log::info!("[VOICE ENROLL] {}", message);

        Ok(EnrollmentProgress {
            samples_collected: count,
            samples_needed: remaining,
            can_complete,
            message,
        })
    }

    /// Average the collected samples into the Boss profile and end the session
    pub fn complete(&self, store: &VoiceProfileStore) -> VoiceResult<EnrollmentResult> {
        let mut session = self.session.lock();

        let EnrollmentSession::Active { embeddings, .. } = &*session else {
            return Err(VoiceError::NoActiveSession);
        };

        let required = self.config.session_samples_min;
        if embeddings.len() < required {
            return Err(VoiceError::InsufficientSamples {
                have: embeddings.len(),
                need: required,
            });
        }

        let samples_used = persist_mean(store, embeddings)?;
        *session = EnrollmentSession::Inactive;

        Ok(EnrollmentResult {
            samples_used,
            message: format!(
                "Voice profile created with {} samples! I'll now recognize your voice.",
                samples_used
            ),
        })
    }

    /// End the session without saving. Always succeeds.
    pub fn cancel(&self) {
        let mut session = self.session.lock();
        if let EnrollmentSession::Active { embeddings, .. } = &*session {
            log::info!(
                "[VOICE ENROLL] Enrollment cancelled ({} samples discarded)",
                embeddings.len()
            );
        }
        *session = EnrollmentSession::Inactive;
    }

    pub fn status(&self) -> EnrollmentStatus {
        let session = self.session.lock();
        let required = self.config.session_samples_min;
        let collected = session.collected();

        EnrollmentStatus {
            active: matches!(*session, EnrollmentSession::Active { .. }),
            samples_collected: collected,
            samples_needed: required.saturating_sub(collected),
            samples_required: required,
            can_complete: collected >= required,
            started_at: match &*session {
                EnrollmentSession::Active { started_at, .. } => Some(started_at.clone()),
                EnrollmentSession::Inactive => None,
            },
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(*self.session.lock(), EnrollmentSession::Active { .. })
    }

    /// Enroll from a batch of samples in one call.
    ///
    /// Samples that fail extraction are skipped. Session state is not touched.
    pub fn enroll_bulk(
        &self,
        extractor: &EmbeddingExtractor,
        store: &VoiceProfileStore,
        inputs: &[AudioInput],
    ) -> VoiceResult<EnrollmentResult> {
        let required = self.config.bulk_samples_min;
        if inputs.len() < required {
            return Err(VoiceError::InsufficientSamples {
                have: inputs.len(),
                need: required,
            });
        }

        let mut embeddings = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.iter().enumerate() {
            match extractor.embed(input) {
                Ok(embedding) => {
                    embeddings.push(embedding);
                    log::info!("[VOICE ENROLL] Processed sample {}/{}", i + 1, inputs.len());
                }
                Err(e) => {
                    log::warn!("[VOICE ENROLL] Error processing sample {}: {}", i + 1, e);
                }
            }
        }

        if embeddings.len() < required {
            return Err(VoiceError::InsufficientSamples {
                have: embeddings.len(),
                need: required,
            });
        }

        let samples_used = persist_mean(store, &embeddings)?;
        Ok(EnrollmentResult {
            samples_used,
            message: "Voice profile created successfully!".to_string(),
        })
    }
}

/// Average `embeddings` and write them as the Boss profile
fn persist_mean(store: &VoiceProfileStore, embeddings: &[Vec<f32>]) -> VoiceResult<usize> {
    let profile = mean_embedding(embeddings)?;
    store.save_profile(&profile, embeddings.len())?;
    Ok(embeddings.len())
}
