use super::encoder::LazyEncoder;
use super::{VoiceError, VoiceResult};
use crate::audio::normalizer::AudioNormalizer;
use crate::audio::{to_unit_range, AudioInput, MIN_EMBED_SAMPLES};
use crate::validation::validate_audio_path;

/// Turns caller audio into speaker embeddings.
///
/// Paths go through the [`AudioNormalizer`]; in-memory waveforms are cast to
/// float and rescaled out of 16-bit range when needed.
#[derive(Debug)]
pub struct EmbeddingExtractor {
    normalizer: AudioNormalizer,
    encoder: LazyEncoder,
}

impl EmbeddingExtractor {
    pub fn new(normalizer: AudioNormalizer, encoder: LazyEncoder) -> Self {
        Self {
            normalizer,
            encoder,
        }
    }

    /// Extract the embedding for one utterance
    pub fn embed(&self, input: &AudioInput) -> VoiceResult<Vec<f32>> {
        let waveform = self.waveform(input)?;

        if waveform.len() < MIN_EMBED_SAMPLES {
            return Err(VoiceError::AudioTooShort {
                samples: waveform.len(),
                min: MIN_EMBED_SAMPLES,
            });
        }

        let encoder = self.encoder.get()?;
        let embedding = encoder.embed(&waveform)?;

        if embedding.len() != encoder.dimension() {
            return Err(VoiceError::Extraction(format!(
                "Model returned {} values, expected {}",
                embedding.len(),
                encoder.dimension()
            )));
        }

        log::debug!(
            "[VOICE] Embedding extracted from {} (dim {})",
            input.describe(),
            embedding.len()
        );
        Ok(embedding)
    }

    /// Embedding dimension, loading the model if necessary
    pub fn dimension(&self) -> VoiceResult<usize> {
        Ok(self.encoder.get()?.dimension())
    }

    pub fn is_model_loaded(&self) -> bool {
        self.encoder.is_loaded()
    }

    fn waveform(&self, input: &AudioInput) -> VoiceResult<Vec<f32>> {
        match input {
            AudioInput::Path(path) => {
                let path = validate_audio_path(path)
                    .map_err(|e| VoiceError::Decode(e.to_string()))?;
                if !path.exists() {
                    return Err(VoiceError::AudioNotFound(path));
                }

                // The normalized handle (and any temp file) is dropped at the end
                // of this arm, before the model runs or an error propagates
                let normalized = self.normalizer.normalize(&path)?;
                log::debug!(
                    "[VOICE] Processing: {} -> {}",
                    path.display(),
                    normalized.path().display()
                );
                normalized.load()
            }
            AudioInput::Pcm16(samples) => Ok(to_unit_range(
                samples.iter().map(|&s| s as f32).collect(),
            )),
            AudioInput::Float(samples) => Ok(to_unit_range(samples.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioConfig;
    use crate::voice::testing::{speech, FakeEncoder};
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::sync::Arc;

    fn extractor(dir: &std::path::Path) -> EmbeddingExtractor {
        let config = AudioConfig {
            ffmpeg_program: "fridai-no-such-transcoder".to_string(),
            ffmpeg_bundled: Some(dir.join("missing-ffmpeg")),
            ..AudioConfig::default()
        };
        EmbeddingExtractor::new(
            AudioNormalizer::new(config, dir.join("tmp_audio")),
            LazyEncoder::ready(Arc::new(FakeEncoder::default())),
        )
    }

    #[test]
    fn test_same_waveform_same_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path());
        let input = AudioInput::Float(speech(1.0, 4000));

        let first = extractor.embed(&input).unwrap();
        let second = extractor.embed(&input).unwrap();
        assert_eq!(first.len(), second.len());
        assert_eq!(first.len(), extractor.dimension().unwrap());
    }

    #[test]
    fn test_short_waveform_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path());

        let result = extractor.embed(&AudioInput::Float(vec![0.1; 1599]));
        assert!(matches!(
            result,
            Err(VoiceError::AudioTooShort {
                samples: 1599,
                min: 1600
            })
        ));
    }

    #[test]
    fn test_pcm16_is_rescaled_before_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path());

        let floats = speech(1.0, 3200);
        let pcm: Vec<i16> = floats.iter().map(|&s| (s * 32768.0) as i16).collect();

        let from_float = extractor.embed(&AudioInput::Float(floats)).unwrap();
        let from_pcm = extractor.embed(&AudioInput::Pcm16(pcm)).unwrap();
        for (a, b) in from_float.iter().zip(&from_pcm) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path());

        let result = extractor.embed(&AudioInput::Path(dir.path().join("gone.webm")));
        assert!(matches!(result, Err(VoiceError::AudioNotFound(_))));
    }

    #[test]
    fn test_wav_file_is_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("sample.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&wav, spec).unwrap();
        for s in speech(1.0, 4800) {
            writer.write_sample((s * 32767.0) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let embedding = extractor(dir.path()).embed(&AudioInput::Path(wav)).unwrap();
        assert_eq!(embedding.len(), FakeEncoder::default().dimension);
    }
}
