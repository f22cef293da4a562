use crate::audio::AudioConfig;
use crate::validation::validate_sample_quota;
use crate::voice::{EncoderConfig, EnrollmentConfig, VerifyPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Application configuration (`config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub encoder: EncoderConfig,
    pub enrollment: EnrollmentConfig,
    pub verify: VerifyPolicy,
}

impl AppConfig {
    /// Load config from file or create default
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?;
            config.validate()?;
            log::info!("Config loaded from: {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
            let toml_str = toml::to_string_pretty(&config)?;
            fs::write(path, toml_str).context("Failed to write default config")?;
            log::info!("Default config created at: {}", path.display());
            Ok(config)
        }
    }

    /// Reject values the voice core cannot work with
    pub fn validate(&self) -> Result<()> {
        validate_sample_quota(self.enrollment.session_samples_min)
            .context("enrollment.session_samples_min")?;
        validate_sample_quota(self.enrollment.bulk_samples_min)
            .context("enrollment.bulk_samples_min")?;

        if self.encoder.embedding_dim == 0 {
            anyhow::bail!("encoder.embedding_dim must be greater than zero");
        }
        if self.audio.transcode_timeout_ms == 0 {
            anyhow::bail!("audio.transcode_timeout_ms must be greater than zero");
        }
        Ok(())
    }
}
