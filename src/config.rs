//! Configuration management for camera sessions
//!
//! Provides loading, saving and validation of the initial session settings
//! and the tuning knobs of the controller (buffer pool, snapshot quality,
//! recording limits, focus timers).

use crate::errors::CameraError;
use crate::types::{AspectRatio, Audio, Facing, Mode, VideoCodec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    pub camera: CameraConfig,
    pub preview: PreviewConfig,
    pub snapshot: SnapshotConfig,
    pub video: VideoConfig,
    pub focus: FocusConfig,
}

/// Initial values of the user-facing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub facing: Facing,
    pub mode: Mode,
    pub audio: Audio,
    /// Shutter sound on captures
    pub play_sounds: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Number of preview buffers queued on the device
    pub buffer_pool_size: usize,
    /// Preferred picture aspect ratio [x, y] in view coordinates; any ratio when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_aspect_ratio: Option<[u32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    pub codec: VideoCodec,
    /// Maximum file size in bytes, 0 for unlimited
    pub max_size_bytes: u64,
    /// Maximum duration in milliseconds, 0 for unlimited
    pub max_duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusConfig {
    /// Delay before tap-to-focus areas are cleared
    pub reset_delay_ms: u64,
    /// Give up on a silent autofocus after this long
    pub timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing: Facing::Back,
            mode: Mode::Picture,
            audio: Audio::On,
            play_sounds: true,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            buffer_pool_size: 2,
            desired_aspect_ratio: None,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { jpeg_quality: 90 }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            codec: VideoCodec::Device,
            max_size_bytes: 0,
            max_duration_ms: 0,
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            reset_delay_ms: 3000,
            timeout_ms: 2500,
        }
    }
}

impl PreviewConfig {
    pub fn desired_aspect_ratio(&self) -> Option<AspectRatio> {
        self.desired_aspect_ratio
            .filter(|[x, y]| *x > 0 && *y > 0)
            .map(|[x, y]| AspectRatio::of(x, y))
    }
}

impl FocusConfig {
    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SessionConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CameraError::IoError(format!("Failed to read config file: {}", e)))?;

        let config: SessionConfig = toml::from_str(&contents)
            .map_err(|e| CameraError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::IoError(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("camera-session.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=16).contains(&self.preview.buffer_pool_size) {
            return Err("Buffer pool size must be between 1 and 16".to_string());
        }
        if let Some([x, y]) = self.preview.desired_aspect_ratio {
            if x == 0 || y == 0 {
                return Err("Desired aspect ratio must be positive".to_string());
            }
        }
        if self.snapshot.jpeg_quality == 0 || self.snapshot.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }
        if self.focus.timeout_ms == 0 {
            return Err("Focus timeout must be positive".to_string());
        }
        Ok(())
    }
}
