//! Deterministic encoder and synthetic voices for unit tests

use super::encoder::SpeakerEncoder;
use super::{VoiceError, VoiceResult};

/// Fundamental of voice 1.0; other voices scale it
const BASE_PITCH_HZ: f32 = 200.0;

/// Synthetic utterance whose pitch is set by `voice`.
///
/// Two calls with the same `voice` sound like the same speaker to
/// [`FakeEncoder`]; voices 1.0 and 2.0 are clearly different speakers.
pub fn speech(voice: f32, len: usize) -> Vec<f32> {
    let pitch = BASE_PITCH_HZ * voice;
    (0..len)
        .map(|i| {
            let t = i as f32 / 16000.0;
            (2.0 * std::f32::consts::PI * pitch * t).sin() * 0.4
                + (2.0 * std::f32::consts::PI * pitch * 2.0 * t).sin() * 0.1
        })
        .collect()
}

/// Unit-length spectral magnitudes at fixed analysis frequencies
#[derive(Debug, Clone)]
pub struct FakeEncoder {
    pub dimension: usize,
}

impl Default for FakeEncoder {
    fn default() -> Self {
        Self { dimension: 8 }
    }
}

impl SpeakerEncoder for FakeEncoder {
    fn embed(&self, waveform: &[f32]) -> VoiceResult<Vec<f32>> {
        let mut embedding: Vec<f32> = (0..self.dimension)
            .map(|k| {
                let hz = 100.0 * (k + 1) as f32;
                let (re, im) = waveform.iter().enumerate().fold((0.0f32, 0.0f32), |acc, (n, &x)| {
                    let phase = 2.0 * std::f32::consts::PI * hz * n as f32 / 16000.0;
                    (acc.0 + x * phase.cos(), acc.1 + x * phase.sin())
                });
                (re * re + im * im).sqrt()
            })
            .collect();

        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(VoiceError::Extraction("Silent input".to_string()));
        }
        embedding.iter_mut().for_each(|v| *v /= norm);
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
