use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Application paths following OS conventions
#[derive(Clone, Debug)]
pub struct AppPaths {
    /// Configuration directory (config.toml)
    pub config: PathBuf,
    /// Data directory (voice profiles, models)
    pub data: PathBuf,
    /// Cache directory (temp audio)
    pub cache: PathBuf,
}

impl AppPaths {
    /// Resolve OS-specific paths for FRIDAI
    ///
    /// # Platform Paths
    ///
    /// ## Linux
    /// - Config: `~/.config/Fridai/`
    /// - Data: `~/.local/share/Fridai/` → voice_profiles/, models/
    /// - Cache: `~/.cache/Fridai/` → tmp_audio/
    ///
    /// ## macOS
    /// - Config: `~/Library/Application Support/com.FRIDAI.Fridai/`
    /// - Data: `~/Library/Application Support/com.FRIDAI.Fridai/`
    /// - Cache: `~/Library/Caches/com.FRIDAI.Fridai/`
    ///
    /// ## Windows
    /// - Config: `%APPDATA%\FRIDAI\Fridai\config\`
    /// - Data: `%APPDATA%\FRIDAI\Fridai\data\`
    /// - Cache: `%LOCALAPPDATA%\FRIDAI\Fridai\cache\`
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "FRIDAI", "Fridai")
            .context("Failed to determine project directories")?;

        Ok(Self {
            config: proj_dirs.config_dir().to_path_buf(),
            data: proj_dirs.data_dir().to_path_buf(),
            cache: proj_dirs.cache_dir().to_path_buf(),
        })
    }

    /// Keep everything under one directory (tests, `--data-dir`)
    pub fn from_root(root: &Path) -> Self {
        Self {
            config: root.join("config"),
            data: root.join("data"),
            cache: root.join("cache"),
        }
    }

    /// Create all necessary directories with subdirectories
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.config).context("Failed to create config directory")?;

        fs::create_dir_all(&self.data).context("Failed to create data directory")?;
        fs::create_dir_all(self.models_dir()).context("Failed to create models directory")?;
        fs::create_dir_all(self.voice_profiles_dir())
            .context("Failed to create voice_profiles directory")?;

        fs::create_dir_all(&self.cache).context("Failed to create cache directory")?;
        fs::create_dir_all(self.tmp_audio_dir())
            .context("Failed to create tmp_audio directory")?;

        log::info!("Application directories initialized");
        log::debug!("  Config: {}", self.config.display());
        log::debug!("  Data:   {}", self.data.display());
        log::debug!("  Cache:  {}", self.cache.display());

        Ok(())
    }

    /// Get path to config file
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Get path to models directory
    pub fn models_dir(&self) -> PathBuf {
        self.data.join("models")
    }

    /// Default location of the speaker embedding model
    pub fn speaker_model_file(&self) -> PathBuf {
        self.models_dir().join("spk").join("speaker-embedding.onnx")
    }

    /// Voice config document and Boss embedding live here
    pub fn voice_profiles_dir(&self) -> PathBuf {
        self.data.join("voice_profiles")
    }

    /// Scratch space for transcoded audio
    pub fn tmp_audio_dir(&self) -> PathBuf {
        self.cache.join("tmp_audio")
    }
}
