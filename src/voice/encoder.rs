//! Speaker embedding models
//!
//! [`SpeakerEncoder`] is the seam between the voice core and the model. The
//! production implementation runs an ONNX export through `ort`; tests inject
//! their own encoder. [`LazyEncoder`] constructs the model at most once and
//! shares it for the lifetime of its owner.

use super::{VoiceError, VoiceResult};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

cfg_if::cfg_if! {
    if #[cfg(feature = "onnx")] {
        use super::fbank::{compute_fbank, mean_normalize, FbankOptions};
        use ort::{
            session::{builder::GraphOptimizationLevel, Session},
            value::Tensor,
        };
        use parking_lot::Mutex;
    }
}

/// Maps a mono 16 kHz waveform in [-1, 1] to a fixed-length embedding
pub trait SpeakerEncoder: Send + Sync {
    /// Compute the embedding for one utterance
    fn embed(&self, waveform: &[f32]) -> VoiceResult<Vec<f32>>;

    /// Length of every vector returned by [`SpeakerEncoder::embed`]
    fn dimension(&self) -> usize;
}

/// Speaker model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// ONNX model file; defaults to the application's models directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,
    /// Intra-op threads for inference
    pub num_threads: usize,
    /// Expected embedding dimension
    pub embedding_dim: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            num_threads: 2,
            embedding_dim: 256,
        }
    }
}

type EncoderFactory = Box<dyn Fn() -> VoiceResult<Arc<dyn SpeakerEncoder>> + Send + Sync>;

/// Get-or-create holder for the speaker model.
///
/// A failed construction leaves the holder empty so the next call retries.
pub struct LazyEncoder {
    cell: OnceCell<Arc<dyn SpeakerEncoder>>,
    factory: EncoderFactory,
}

impl LazyEncoder {
    /// Build the encoder with `factory` on first use
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> VoiceResult<Arc<dyn SpeakerEncoder>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(factory),
        }
    }

    /// Wrap an already constructed encoder
    pub fn ready(encoder: Arc<dyn SpeakerEncoder>) -> Self {
        Self {
            cell: OnceCell::with_value(encoder),
            factory: Box::new(|| {
                Err(VoiceError::ModelUnavailable(
                    "Encoder factory is not used once initialized".to_string(),
                ))
            }),
        }
    }

    /// Return the shared encoder, constructing it on first call
    pub fn get(&self) -> VoiceResult<&Arc<dyn SpeakerEncoder>> {
        self.cell.get_or_try_init(|| {
            log::info!("Loading voice encoder...");
            let encoder = (self.factory)()?;
            log::info!("Voice encoder loaded (dimension {})", encoder.dimension());
            Ok(encoder)
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl fmt::Debug for LazyEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyEncoder")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// ONNX speaker embedding model (WeSpeaker / 3D-Speaker style exports).
///
/// Input: `[1, frames, 80]` mean-normalized log-mel fbank.
/// Output: `[1, dim]` embedding.
#[cfg(feature = "onnx")]
pub struct OnnxSpeakerEncoder {
    session: Mutex<Session>,
    fbank: FbankOptions,
    dimension: usize,
}

#[cfg(feature = "onnx")]
impl OnnxSpeakerEncoder {
    pub fn new(model_path: &Path, config: &EncoderConfig) -> VoiceResult<Self> {
        log::info!(
            "Initializing speaker embedding model from: {}",
            model_path.display()
        );

        if !model_path.exists() {
            return Err(VoiceError::ModelUnavailable(format!(
                "Speaker embedding model not found: {}",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| VoiceError::ModelUnavailable(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| VoiceError::ModelUnavailable(e.to_string()))?
            .with_intra_threads(config.num_threads)
            .map_err(|e| VoiceError::ModelUnavailable(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| VoiceError::ModelUnavailable(e.to_string()))?;

        log::info!(
            "Speaker embedding model ready: threads={}, dimension={}",
            config.num_threads,
            config.embedding_dim
        );

        Ok(Self {
            session: Mutex::new(session),
            fbank: FbankOptions::default(),
            dimension: config.embedding_dim,
        })
    }
}

#[cfg(feature = "onnx")]
impl SpeakerEncoder for OnnxSpeakerEncoder {
    fn embed(&self, waveform: &[f32]) -> VoiceResult<Vec<f32>> {
        let mut features = compute_fbank(waveform, &self.fbank).ok_or(
            VoiceError::AudioTooShort {
                samples: waveform.len(),
                min: self.fbank.frame_length,
            },
        )?;
        mean_normalize(&mut features);

        let num_frames = features.len();
        let input_data: Vec<f32> = features.into_iter().flatten().collect();
        let input_shape = [1_usize, num_frames, self.fbank.num_mels];

        let input_tensor = Tensor::from_array((input_shape, input_data))
            .map_err(|e| VoiceError::Extraction(e.to_string()))?;

        // Inference needs exclusive access to the session
        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| VoiceError::Extraction(e.to_string()))?;

        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| VoiceError::Extraction("No output tensor".to_string()))?;
        let (_, embedding) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VoiceError::Extraction(e.to_string()))?;

        Ok(embedding.to_vec())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Placeholder when the onnx feature is not enabled
#[cfg(not(feature = "onnx"))]
pub struct OnnxSpeakerEncoder {
    _private: std::marker::PhantomData<()>,
}

#[cfg(not(feature = "onnx"))]
impl OnnxSpeakerEncoder {
    pub fn new(_model_path: &Path, _config: &EncoderConfig) -> VoiceResult<Self> {
        Err(VoiceError::ModelUnavailable(
            "Speaker model requires the onnx feature. Build with --features onnx".to_string(),
        ))
    }
}

#[cfg(not(feature = "onnx"))]
impl SpeakerEncoder for OnnxSpeakerEncoder {
    fn embed(&self, _waveform: &[f32]) -> VoiceResult<Vec<f32>> {
        Err(VoiceError::ModelUnavailable(
            "Speaker model not available".to_string(),
        ))
    }

    fn dimension(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ConstantEncoder;

    impl SpeakerEncoder for ConstantEncoder {
        fn embed(&self, _waveform: &[f32]) -> VoiceResult<Vec<f32>> {
            Ok(vec![1.0; 4])
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    #[test]
    fn test_lazy_encoder_builds_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let lazy = LazyEncoder::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ConstantEncoder) as Arc<dyn SpeakerEncoder>)
        });

        assert!(!lazy.is_loaded());
        for _ in 0..3 {
            assert_eq!(lazy.get().unwrap().dimension(), 4);
        }
        assert!(lazy.is_loaded());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_encoder_retries_after_failure() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let lazy = LazyEncoder::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(VoiceError::ModelUnavailable("cold start".to_string()))
            } else {
                Ok(Arc::new(ConstantEncoder) as Arc<dyn SpeakerEncoder>)
            }
        });

        assert!(lazy.get().is_err());
        assert!(!lazy.is_loaded());
        assert!(lazy.get().is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_model_is_unavailable() {
        let result = OnnxSpeakerEncoder::new(
            std::path::Path::new("/nonexistent/speaker.onnx"),
            &EncoderConfig::default(),
        );
        assert!(matches!(result, Err(VoiceError::ModelUnavailable(_))));
    }
}
