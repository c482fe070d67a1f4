//! Game settings
//!
//! Configuration only: bucket size, physics tuning and startup behaviour.
//! Nothing about a session (score, fruits) is ever written anywhere.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::MAX_LEVEL;
use crate::fruit_radius;

/// Why settings could not be loaded
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("malformed settings JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
}

/// Game settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Bucket ===
    /// Inner width in logical units
    pub bucket_width: f32,
    /// Inner height in logical units
    pub bucket_height: f32,

    // === Physics ===
    /// Downward acceleration (units/s², y points down)
    pub gravity: f32,
    /// Fixed simulation sub-step in milliseconds
    pub physics_step_ms: f64,
    /// Bounciness of fruits
    pub fruit_restitution: f32,
    /// Initial downward speed of a dropped fruit
    pub drop_speed: f32,

    // === Startup ===
    /// Frame-clock time between activation and the first session
    pub start_delay_ms: f64,
    /// RNG seed; the host picks one when absent
    pub seed: Option<u64>,
    /// Log level name for the browser console logger
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bucket_width: 12.0,
            bucket_height: 20.0,

            gravity: 10.0,
            physics_step_ms: 1000.0 / 60.0,
            fruit_restitution: 0.1,
            drop_speed: 20.0,

            start_delay_ms: 100.0,
            seed: None,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Parse and validate settings; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.bucket_width > 0.0 && self.bucket_height > 0.0) {
            return Err(SettingsError::Invalid(format!(
                "bucket must have positive size, got {}x{}",
                self.bucket_width, self.bucket_height
            )));
        }
        let widest = 2.0 * fruit_radius(MAX_LEVEL);
        if self.bucket_width <= widest {
            return Err(SettingsError::Invalid(format!(
                "bucket width {} cannot fit a level {} fruit ({})",
                self.bucket_width, MAX_LEVEL, widest
            )));
        }
        if !(self.physics_step_ms > 0.0) {
            return Err(SettingsError::Invalid(format!(
                "physics step must be positive, got {}",
                self.physics_step_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.fruit_restitution) {
            return Err(SettingsError::Invalid(format!(
                "restitution must be within 0..=1, got {}",
                self.fruit_restitution
            )));
        }
        if self.start_delay_ms < 0.0 {
            return Err(SettingsError::Invalid("start delay cannot be negative".to_string()));
        }
        Ok(())
    }

    /// Log level for the console logger, `Info` if unrecognised
    pub fn log_level(&self) -> log::Level {
        self.log_level.parse().unwrap_or(log::Level::Info)
    }

    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "melon_merge_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring stored settings: {}", e),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Load settings from the JSON file named by the first CLI argument
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        let Some(path) = std::env::args().nth(1) else {
            log::info!("Using default settings");
            return Self::default();
        };
        match Self::from_file(&path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path);
                settings
            }
            Err(e) => {
                log::warn!("Ignoring settings file {}: {}", path, e);
                Self::default()
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
