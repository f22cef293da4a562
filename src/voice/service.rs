//! Caller-facing voice recognition API
//!
//! One [`VoiceService`] exists per application. It owns the extractor (and
//! with it the lazily loaded speaker model), the profile store, the single
//! enrollment session and the verifier.

use super::encoder::{LazyEncoder, OnnxSpeakerEncoder, SpeakerEncoder};
use super::extractor::EmbeddingExtractor;
use super::session::{
    EnrollmentManager, EnrollmentProgress, EnrollmentResult, EnrollmentStarted, EnrollmentStatus,
};
use super::store::{VoiceProfileStore, VoiceStatus};
use super::verifier::{SpeakerVerifier, VerificationResult};
use super::VoiceResult;
use crate::audio::normalizer::AudioNormalizer;
use crate::audio::AudioInput;
use crate::config::AppConfig;
use crate::paths::AppPaths;
use std::sync::Arc;

#[derive(Debug)]
pub struct VoiceService {
    extractor: EmbeddingExtractor,
    store: VoiceProfileStore,
    enrollment: EnrollmentManager,
    verifier: SpeakerVerifier,
}

impl VoiceService {
    /// Assemble a service from its parts
    pub fn new(
        extractor: EmbeddingExtractor,
        store: VoiceProfileStore,
        enrollment: EnrollmentManager,
        verifier: SpeakerVerifier,
    ) -> Self {
        let policy = verifier.policy();
        if policy.is_fail_open() {
            log::warn!(
                "[VOICE] Verification fails open (not enrolled: {}, on error: {}); unverified speakers are treated as the Boss",
                policy.allow_when_not_enrolled,
                policy.allow_on_error
            );
        }

        Self {
            extractor,
            store,
            enrollment,
            verifier,
        }
    }

    /// Build the production service: ONNX encoder, OS paths, user configuration.
    ///
    /// The model is not loaded until the first embedding is requested.
    pub fn from_app(paths: &AppPaths, config: &AppConfig) -> Self {
        let encoder_config = config.encoder.clone();
        let model_path = encoder_config
            .model_path
            .clone()
            .unwrap_or_else(|| paths.speaker_model_file());

        let encoder = LazyEncoder::new(move || {
            let encoder = OnnxSpeakerEncoder::new(&model_path, &encoder_config)?;
            Ok(Arc::new(encoder) as Arc<dyn SpeakerEncoder>)
        });

        let normalizer = AudioNormalizer::new(config.audio.clone(), paths.tmp_audio_dir());

        Self::new(
            EmbeddingExtractor::new(normalizer, encoder),
            VoiceProfileStore::new(paths.voice_profiles_dir()),
            EnrollmentManager::new(config.enrollment.clone()),
            SpeakerVerifier::new(config.verify.clone()),
        )
    }

    pub fn store(&self) -> &VoiceProfileStore {
        &self.store
    }

    pub fn verify_speaker(&self, audio: &AudioInput) -> VerificationResult {
        self.verifier.verify(&self.extractor, &self.store, audio)
    }

    pub fn start_enrollment_session(&self) -> EnrollmentStarted {
        self.enrollment.start()
    }

    pub fn add_enrollment_sample(&self, audio: &AudioInput) -> VoiceResult<EnrollmentProgress> {
        self.enrollment.add_sample(&self.extractor, audio)
    }

    pub fn complete_enrollment(&self) -> VoiceResult<EnrollmentResult> {
        self.enrollment.complete(&self.store)
    }

    pub fn cancel_enrollment(&self) {
        self.enrollment.cancel()
    }

    pub fn get_enrollment_status(&self) -> EnrollmentStatus {
        self.enrollment.status()
    }

    pub fn is_enrollment_active(&self) -> bool {
        self.enrollment.is_active()
    }

    pub fn get_voice_status(&self) -> VoiceStatus {
        self.store.status()
    }

    pub fn set_similarity_threshold(&self, threshold: f32) -> VoiceResult<f32> {
        self.store.set_threshold(threshold)
    }

    pub fn set_guest_mode(&self, enabled: bool) -> VoiceResult<bool> {
        self.store.set_guest_mode(enabled)
    }

    pub fn clear_boss_profile(&self) -> VoiceResult<()> {
        self.store.clear()
    }

    /// Bulk enrollment from already recorded samples
    pub fn enroll_boss_voice(&self, samples: &[AudioInput]) -> VoiceResult<EnrollmentResult> {
        self.enrollment.enroll_bulk(&self.extractor, &self.store, samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioConfig;
    use crate::voice::session::EnrollmentConfig;
    use crate::voice::testing::{speech, FakeEncoder};
    use crate::voice::verifier::{VerificationStatus, VerifyPolicy};
    use crate::voice::VoiceError;
    use std::thread;

    fn service(dir: &std::path::Path) -> VoiceService {
        VoiceService::new(
            EmbeddingExtractor::new(
                AudioNormalizer::new(AudioConfig::default(), dir.join("tmp_audio")),
                LazyEncoder::ready(Arc::new(FakeEncoder::default())),
            ),
            VoiceProfileStore::new(dir.join("voice_profiles")),
            EnrollmentManager::new(EnrollmentConfig::default()),
            SpeakerVerifier::new(VerifyPolicy::default()),
        )
    }

    #[test]
    fn test_full_enrollment_then_verification() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());

        let before = service.verify_speaker(&AudioInput::Float(speech(2.0, 4000)));
        assert_eq!(before.status, VerificationStatus::NotEnrolled);
        assert!(before.is_boss);

        service.start_enrollment_session();
        for i in 0..20 {
            let len = 3200 + 160 * (i % 5);
            service
                .add_enrollment_sample(&AudioInput::Float(speech(1.0, len)))
                .unwrap();
        }
        assert!(service.get_enrollment_status().can_complete);

        let result = service.complete_enrollment().unwrap();
        assert_eq!(result.samples_used, 20);
        assert!(!service.is_enrollment_active());

        let status = service.get_voice_status();
        assert!(status.enrolled);
        assert_eq!(status.num_samples, 20);

        let boss = service.verify_speaker(&AudioInput::Float(speech(1.0, 4800)));
        assert!(boss.is_boss);
        let guest = service.verify_speaker(&AudioInput::Float(speech(2.0, 4800)));
        assert!(!guest.is_boss);
        assert_eq!(guest.status, VerificationStatus::Verified);
    }

    #[test]
    fn test_clear_reverts_to_not_enrolled() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let samples: Vec<AudioInput> = (0..3)
            .map(|_| AudioInput::Float(speech(1.0, 3200)))
            .collect();
        service.enroll_boss_voice(&samples).unwrap();
        service.set_similarity_threshold(0.8).unwrap();

        service.clear_boss_profile().unwrap();
        let status = service.get_voice_status();
        assert!(!status.enrolled);
        assert_eq!(status.threshold, 0.8);

        let result = service.verify_speaker(&AudioInput::Float(speech(2.0, 4000)));
        assert_eq!(result.status, VerificationStatus::NotEnrolled);
    }

    #[test]
    fn test_invalid_threshold_is_structured() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let err = service.set_similarity_threshold(1.5).unwrap_err();
        assert_eq!(err.code(), "invalid_threshold");
        assert_eq!(service.get_voice_status().threshold, 0.75);
    }

    #[test]
    fn test_guest_mode_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        assert!(service.get_voice_status().guest_mode_enabled);
        service.set_guest_mode(false).unwrap();
        assert!(!service.get_voice_status().guest_mode_enabled);
    }

    #[test]
    fn test_concurrent_samples_are_all_counted() {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(service(dir.path()));
        service.start_enrollment_session();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = Arc::clone(&service);
                thread::spawn(move || {
                    for _ in 0..5 {
                        service
                            .add_enrollment_sample(&AudioInput::Float(speech(1.0, 1600)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(service.get_enrollment_status().samples_collected, 20);
        assert!(service.complete_enrollment().is_ok());
    }

    #[test]
    fn test_session_errors_without_start() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        assert!(matches!(
            service.add_enrollment_sample(&AudioInput::Float(speech(1.0, 3200))),
            Err(VoiceError::NoActiveSession)
        ));
        assert!(matches!(
            service.complete_enrollment(),
            Err(VoiceError::NoActiveSession)
        ));
        service.cancel_enrollment();
        assert!(!service.is_enrollment_active());
    }
}
