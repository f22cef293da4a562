//! Audio normalization to mono 16 kHz
//!
//! Canonical WAV files pass straight through. Anything else is handed to an
//! external `ffmpeg` (search path first, then the bundled copy) which writes a
//! 16 kHz mono WAV into a scoped temp file. When no transcoder succeeds the
//! original file is loaded directly and resampled in-process.

use super::{downmix, resample, AudioConfig, TARGET_CHANNELS, TARGET_SAMPLE_RATE};
use crate::voice::{VoiceError, VoiceResult};
use hound::{SampleFormat, WavReader};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempPath;

/// How often a running transcoder is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[cfg(windows)]
const BUNDLED_FFMPEG_NAME: &str = "ffmpeg.exe";
#[cfg(not(windows))]
const BUNDLED_FFMPEG_NAME: &str = "ffmpeg";

/// A waveform source ready for loading.
///
/// When the audio had to be transcoded, this value owns the temp file and
/// deletes it on drop.
#[derive(Debug)]
pub struct NormalizedAudio {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl NormalizedAudio {
    /// File the waveform will be read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when a transcoder produced the file
    pub fn is_transcoded(&self) -> bool {
        self.temp.is_some()
    }

    /// Decode the file into a mono 16 kHz float waveform
    pub fn load(&self) -> VoiceResult<Vec<f32>> {
        load_wav_mono_16k(&self.path)
    }
}

/// Converts arbitrary audio files into canonical mono 16 kHz WAV
#[derive(Debug, Clone)]
pub struct AudioNormalizer {
    config: AudioConfig,
    temp_dir: PathBuf,
}

impl AudioNormalizer {
    pub fn new(config: AudioConfig, temp_dir: PathBuf) -> Self {
        let temp_dir = config.temp_dir.clone().unwrap_or(temp_dir);
        Self { config, temp_dir }
    }

    /// Normalize the audio at `path`.
    ///
    /// Never fails because of the transcoder: on timeout, a missing binary or
    /// a failed conversion the original file is returned for direct loading.
    pub fn normalize(&self, path: &Path) -> VoiceResult<NormalizedAudio> {
        if !path.exists() {
            return Err(VoiceError::AudioNotFound(path.to_path_buf()));
        }

        if is_canonical_wav(path) {
            log::debug!("Audio already mono {}Hz: {}", TARGET_SAMPLE_RATE, path.display());
            return Ok(NormalizedAudio {
                path: path.to_path_buf(),
                temp: None,
            });
        }

        match self.transcode(path) {
            Ok(temp) => Ok(NormalizedAudio {
                path: temp.to_path_buf(),
                temp: Some(temp),
            }),
            Err(e) => {
                log::warn!("{} - trying direct load of {}", e, path.display());
                Ok(NormalizedAudio {
                    path: path.to_path_buf(),
                    temp: None,
                })
            }
        }
    }

    /// Transcoders to try, in order
    pub fn transcoder_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(&self.config.ffmpeg_program)];

        let bundled = self.config.ffmpeg_bundled.clone().or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|dir| dir.join(BUNDLED_FFMPEG_NAME)))
        });
        if let Some(bundled) = bundled {
            candidates.push(bundled);
        }

        candidates
    }

    fn transcode(&self, input: &Path) -> VoiceResult<TempPath> {
        fs::create_dir_all(&self.temp_dir)?;

        // Dropping the TempPath deletes the file, so every early return cleans up
        let output = tempfile::Builder::new()
            .prefix("fridai-")
            .suffix(".wav")
            .tempfile_in(&self.temp_dir)?
            .into_temp_path();

        let timeout = Duration::from_millis(self.config.transcode_timeout_ms);
        let mut last_error = VoiceError::Transcode("No transcoder configured".to_string());

        for program in self.transcoder_candidates() {
            match run_transcoder(&program, input, &output, timeout) {
                Ok(()) => {
                    let written = fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
                    if written == 0 {
                        last_error = VoiceError::Transcode(format!(
                            "{} produced no output",
                            program.display()
                        ));
                        continue;
                    }
                    log::debug!(
                        "Transcoded {} -> {} with {}",
                        input.display(),
                        output.display(),
                        program.display()
                    );
                    return Ok(output);
                }
                Err(e) => {
                    log::debug!("Transcoder {} failed: {}", program.display(), e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// Run one transcoder to completion or until `timeout` elapses
fn run_transcoder(
    program: &Path,
    input: &Path,
    output: &Path,
    timeout: Duration,
) -> VoiceResult<()> {
    let mut child = Command::new(program)
        .args(["-nostdin", "-y", "-loglevel", "error", "-i"])
        .arg(input)
        .args(["-ar", &TARGET_SAMPLE_RATE.to_string()])
        .args(["-ac", &TARGET_CHANNELS.to_string()])
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            VoiceError::Transcode(format!("Failed to launch {}: {}", program.display(), e))
        })?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait()? {
            Some(status) if status.success() => return Ok(()),
            Some(status) => {
                return Err(VoiceError::Transcode(format!(
                    "{} exited with {}",
                    program.display(),
                    status
                )))
            }
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(VoiceError::Transcode(format!(
                    "{} timed out after {}ms",
                    program.display(),
                    timeout.as_millis()
                )));
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    }
}

/// True when `path` is a WAV file that is already mono 16 kHz
pub fn is_canonical_wav(path: &Path) -> bool {
    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);
    if !is_wav {
        return false;
    }

    match WavReader::open(path) {
        Ok(reader) => {
            let spec = reader.spec();
            spec.channels as usize == TARGET_CHANNELS && spec.sample_rate == TARGET_SAMPLE_RATE
        }
        Err(_) => false,
    }
}

/// Decode a WAV file into a mono 16 kHz float waveform.
///
/// Integer formats are scaled by their bit depth into [-1, 1]; other rates
/// and channel layouts are downmixed and resampled.
pub fn load_wav_mono_16k(path: &Path) -> VoiceResult<Vec<f32>> {
    let mut reader = WavReader::open(path)
        .map_err(|e| VoiceError::Decode(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| VoiceError::Decode(format!("{}: {}", path.display(), e)))?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| VoiceError::Decode(format!("{}: {}", path.display(), e)))?
        }
    };

    let mono = downmix(&interleaved, spec.channels as usize);
    resample(&mono, spec.sample_rate, TARGET_SAMPLE_RATE)
}
