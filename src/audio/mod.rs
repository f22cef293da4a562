pub mod normalizer;

use crate::voice::{VoiceError, VoiceResult};
use rubato::{FftFixedIn, Resampler};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Target sample rate for all audio processing (16 kHz)
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Target number of channels for processing (always mono)
pub const TARGET_CHANNELS: usize = 1;

/// Shortest waveform accepted for embedding (0.1 s at 16 kHz)
pub const MIN_EMBED_SAMPLES: usize = 1600;

/// Input chunk size handed to the resampler
const RESAMPLE_CHUNK: usize = 1024;

/// Peak value of signed 16-bit PCM, used to rescale integer-range waveforms
const PCM16_SCALE: f32 = 32768.0;

/// Audio handed to the voice core: a file on disk or an in-memory waveform.
///
/// In-memory waveforms are assumed to already be mono 16 kHz.
#[derive(Debug, Clone)]
pub enum AudioInput {
    /// Any container/codec the transcoder understands
    Path(PathBuf),
    /// Signed 16-bit samples
    Pcm16(Vec<i16>),
    /// Float samples, either in [-1, 1] or in 16-bit integer range
    Float(Vec<f32>),
}

impl AudioInput {
    /// Short description for log lines
    pub fn describe(&self) -> String {
        match self {
            AudioInput::Path(path) => path.display().to_string(),
            AudioInput::Pcm16(samples) => format!("<pcm16: {} samples>", samples.len()),
            AudioInput::Float(samples) => format!("<f32: {} samples>", samples.len()),
        }
    }
}

impl From<PathBuf> for AudioInput {
    fn from(path: PathBuf) -> Self {
        AudioInput::Path(path)
    }
}

impl From<&Path> for AudioInput {
    fn from(path: &Path) -> Self {
        AudioInput::Path(path.to_path_buf())
    }
}

impl From<Vec<i16>> for AudioInput {
    fn from(samples: Vec<i16>) -> Self {
        AudioInput::Pcm16(samples)
    }
}

impl From<Vec<f32>> for AudioInput {
    fn from(samples: Vec<f32>) -> Self {
        AudioInput::Float(samples)
    }
}

/// Audio transcoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Transcoder looked up on the search path
    pub ffmpeg_program: String,
    /// Bundled transcoder, tried when the search path has none.
    /// Defaults to `ffmpeg` next to the executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_bundled: Option<PathBuf>,
    /// Upper bound on a single transcode (ms)
    pub transcode_timeout_ms: u64,
    /// Override for the temp directory holding transcoded audio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ffmpeg_program: "ffmpeg".to_string(),
            ffmpeg_bundled: None,
            transcode_timeout_ms: 30_000,
            temp_dir: None,
        }
    }
}

/// Bring an in-memory waveform into the [-1, 1] float range.
///
/// Samples whose peak exceeds 1.0 are assumed to be 16-bit PCM and divided
/// by 32768. Samples already in range are returned untouched.
pub fn to_unit_range(mut samples: Vec<f32>) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    if peak > 1.0 {
        for s in samples.iter_mut() {
            *s /= PCM16_SCALE;
        }
    }
    samples
}

/// Convert interleaved samples to mono by averaging channels
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= TARGET_CHANNELS {
        return interleaved.to_vec();
    }

    interleaved
        .chunks(channels)
        .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
        .collect()
}

/// Resample a mono waveform from `from_rate` to `to_rate`.
///
/// The resampler's output delay is trimmed and the result is cut to the
/// length implied by the rate ratio, so durations are preserved.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> VoiceResult<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 {
        return Err(VoiceError::Decode("Input sample rate is zero".to_string()));
    }

    log::debug!(
        "Resampling {} samples: {}Hz -> {}Hz",
        samples.len(),
        from_rate,
        to_rate
    );

    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        RESAMPLE_CHUNK,
        2,               // Sub-chunks (rubato parameter)
        TARGET_CHANNELS, // Always mono for processing
    )
    .map_err(|e| VoiceError::Decode(format!("Failed to create resampler: {}", e)))?;

    let expected = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay);

    let mut pos = 0;
    while samples.len() - pos >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let chunk = [&samples[pos..pos + needed]];
        let resampled = resampler
            .process(&chunk[..], None)
            .map_err(|e| VoiceError::Decode(format!("Resampling error: {}", e)))?;
        output.extend_from_slice(&resampled[0]);
        pos += needed;
    }

    if pos < samples.len() {
        let tail = [&samples[pos..]];
        let resampled = resampler
            .process_partial(Some(&tail[..]), None)
            .map_err(|e| VoiceError::Decode(format!("Resampling error: {}", e)))?;
        output.extend_from_slice(&resampled[0]);
    }

    // Flush the samples still held back by the resampler delay
    while output.len() < expected + delay {
        let resampled = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| VoiceError::Decode(format!("Resampling error: {}", e)))?;
        if resampled[0].is_empty() {
            break;
        }
        output.extend_from_slice(&resampled[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}
