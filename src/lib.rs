//! FRIDAI voice recognition: Boss enrollment and speaker verification

pub mod audio;
pub mod config;
pub mod paths;
pub mod validation;
pub mod voice;

pub use audio::AudioInput;
pub use config::AppConfig;
pub use paths::AppPaths;
pub use voice::{VoiceError, VoiceResult, VoiceService};
