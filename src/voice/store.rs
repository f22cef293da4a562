//! Persistent Boss voice profile
//!
//! Two files live side by side in the voice profiles directory:
//! `voice_config.json` (enrollment metadata and settings) and
//! `boss_profile.bin` (the reference embedding as little-endian f32).

use super::embedding::{decode_embedding, encode_embedding};
use super::{VoiceError, VoiceResult};
use crate::validation::validate_similarity_threshold;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "voice_config.json";
pub const PROFILE_FILE: &str = "boss_profile.bin";

/// Decision threshold used until the user tunes it
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;

/// Current layout of `voice_config.json`
pub const SCHEMA_VERSION: u32 = 1;

/// Persisted voice settings.
///
/// Every field is optional on disk; missing or mistyped keys take their
/// defaults. Documents written before versioning have no `schema_version`
/// and read as 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceConfig {
    pub schema_version: u32,
    pub boss_enrolled: bool,
    pub enrollment_date: Option<String>,
    pub num_samples: usize,
    pub similarity_threshold: f32,
    pub guest_mode_enabled: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            boss_enrolled: false,
            enrollment_date: None,
            num_samples: 0,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            guest_mode_enabled: true,
        }
    }
}

impl VoiceConfig {
    /// Merge a parsed document over the defaults, key by key
    fn from_document(doc: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        Self {
            schema_version: field(doc, "schema_version", 0),
            boss_enrolled: field(doc, "boss_enrolled", defaults.boss_enrolled),
            enrollment_date: field(doc, "enrollment_date", defaults.enrollment_date),
            num_samples: field(doc, "num_samples", defaults.num_samples),
            similarity_threshold: field(
                doc,
                "similarity_threshold",
                defaults.similarity_threshold,
            ),
            guest_mode_enabled: field(doc, "guest_mode_enabled", defaults.guest_mode_enabled),
        }
    }

    /// Bring the document up to [`SCHEMA_VERSION`] and enforce the threshold range
    fn migrate(mut self) -> Self {
        if self.schema_version < SCHEMA_VERSION {
            log::info!(
                "[VOICE] Migrating voice config v{} -> v{}",
                self.schema_version,
                SCHEMA_VERSION
            );
            self.schema_version = SCHEMA_VERSION;
        }

        if validate_similarity_threshold(self.similarity_threshold).is_err() {
            log::warn!(
                "[VOICE] Threshold {} out of range, resetting to {}",
                self.similarity_threshold,
                DEFAULT_SIMILARITY_THRESHOLD
            );
            self.similarity_threshold = DEFAULT_SIMILARITY_THRESHOLD;
        }
        self
    }
}

/// Read `key` from `doc`, falling back when it is absent or has the wrong type
fn field<T: DeserializeOwned>(doc: &Map<String, Value>, key: &str, fallback: T) -> T {
    match doc.get(key) {
        None => fallback,
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            log::warn!("[VOICE] Ignoring invalid `{}` in voice config: {}", key, e);
            fallback
        }),
    }
}

/// Snapshot reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceStatus {
    pub enrolled: bool,
    pub enrollment_date: Option<String>,
    pub num_samples: usize,
    pub threshold: f32,
    pub guest_mode_enabled: bool,
}

/// File-backed store for the voice profile
#[derive(Debug, Clone)]
pub struct VoiceProfileStore {
    dir: PathBuf,
}

impl VoiceProfileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn profile_path(&self) -> PathBuf {
        self.dir.join(PROFILE_FILE)
    }

    /// Load the settings document.
    ///
    /// A missing or unreadable document yields defaults; this never fails.
    pub fn load(&self) -> VoiceConfig {
        let path = self.config_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return VoiceConfig::default(),
            Err(e) => {
                log::warn!("[VOICE] Failed to read {}: {}", path.display(), e);
                return VoiceConfig::default();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(doc)) => VoiceConfig::from_document(&doc).migrate(),
            Ok(_) => {
                log::warn!(
                    "[VOICE] Voice config at {} is not an object, using defaults",
                    path.display()
                );
                VoiceConfig::default()
            }
            Err(e) => {
                log::warn!(
                    "[VOICE] Corrupt voice config at {}, using defaults: {}",
                    path.display(),
                    e
                );
                VoiceConfig::default()
            }
        }
    }

    /// Persist the settings document
    pub fn save(&self, config: &VoiceConfig) -> VoiceResult<()> {
        fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string_pretty(config)
            .map_err(|e| VoiceError::StorageCorruption(e.to_string()))?;
        write_private(&self.config_path(), json.as_bytes())
    }

    /// Enrolled flag set and reference embedding present
    pub fn is_enrolled(&self) -> bool {
        self.load().boss_enrolled && self.profile_path().exists()
    }

    /// Store a new reference embedding and mark the profile enrolled
    pub fn save_profile(&self, embedding: &[f32], num_samples: usize) -> VoiceResult<VoiceConfig> {
        fs::create_dir_all(&self.dir)?;
        write_private(&self.profile_path(), &encode_embedding(embedding))?;

        let mut config = self.load();
        config.boss_enrolled = true;
        config.enrollment_date = Some(chrono::Local::now().to_rfc3339());
        config.num_samples = num_samples;
        self.save(&config)?;

        log::info!(
            "[VOICE] Boss profile saved: {} samples, dim {}",
            num_samples,
            embedding.len()
        );
        Ok(config)
    }

    /// Read the reference embedding
    pub fn load_embedding(&self) -> VoiceResult<Vec<f32>> {
        let path = self.profile_path();
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoiceError::StorageCorruption(format!("{} is missing", path.display()))
            } else {
                VoiceError::Io(e)
            }
        })?;
        decode_embedding(&bytes)
    }

    /// Remove the Boss profile. Threshold and guest mode are kept.
    pub fn clear(&self) -> VoiceResult<()> {
        match fs::remove_file(self.profile_path()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut config = self.load();
        config.boss_enrolled = false;
        config.enrollment_date = None;
        config.num_samples = 0;
        self.save(&config)?;

        log::info!("[VOICE] Boss profile cleared");
        Ok(())
    }

    /// Validate and persist a new decision threshold
    pub fn set_threshold(&self, threshold: f32) -> VoiceResult<f32> {
        let threshold = validate_similarity_threshold(threshold)
            .map_err(|_| VoiceError::InvalidThreshold(threshold))?;

        let mut config = self.load();
        config.similarity_threshold = threshold;
        self.save(&config)?;

        log::info!("[VOICE] Similarity threshold set to {:.2}", threshold);
        Ok(threshold)
    }

    /// Persist the guest-mode flag
    pub fn set_guest_mode(&self, enabled: bool) -> VoiceResult<bool> {
        let mut config = self.load();
        config.guest_mode_enabled = enabled;
        self.save(&config)?;

        log::info!(
            "[VOICE] Guest mode {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(enabled)
    }

    pub fn status(&self) -> VoiceStatus {
        let config = self.load();
        VoiceStatus {
            enrolled: config.boss_enrolled && self.profile_path().exists(),
            enrollment_date: config.enrollment_date,
            num_samples: config.num_samples,
            threshold: config.similarity_threshold,
            guest_mode_enabled: config.guest_mode_enabled,
        }
    }
}

/// Write `contents` to `path`, readable by the owner only
fn write_private(path: &Path, contents: &[u8]) -> VoiceResult<()> {
    fs::write(path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}
