//! Persisted preferences.
//!
//! Loads settings from coca_config.json next to the executable. The file is a
//! flat key/value record; the timer core only reads the crop and planter
//! preferences from it.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::crop::{CropType, PlanterType};

/// A screen rectangle in absolute pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRect {
    /// X position of top-left corner
    pub x: i32,
    /// Y position of top-left corner
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rejects empty rectangles. An area selector may hand back a click
    /// without a drag, which yields a zero-sized rect.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!(
                "Capture area {}x{} at ({}, {}) is empty",
                self.width,
                self.height,
                self.x,
                self.y
            ));
        }
        Ok(())
    }
}

impl Default for ScreenRect {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 200,
            height: 60,
        }
    }
}

/// Growing preferences used by the duration policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub crop_type: CropType,
    #[serde(default)]
    pub planter_type: PlanterType,
    /// Let a crop label read from the screen override `crop_type`
    #[serde(default = "default_true")]
    pub auto_detect_crop: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            crop_type: CropType::Coca,
            planter_type: PlanterType::Basic,
            auto_detect_crop: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Complete application configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Screen area holding the progress percentage
    #[serde(default)]
    pub selected_area: Option<ScreenRect>,
    #[serde(flatten)]
    pub preferences: Preferences,
    /// Save preprocessed images to the screenshots folder on each detection
    #[serde(default = "default_true")]
    pub save_debug_artifacts: bool,
    /// Read this image file instead of the live screen
    #[serde(default)]
    pub capture_source: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            selected_area: None,
            preferences: Preferences::default(),
            save_debug_artifacts: true,
            capture_source: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`, or returns defaults when the file is
    /// missing or unreadable.
    pub fn load(path: &Path) -> AppConfig {
        crate::log(&format!("Looking for config at: {}", path.display()));

        if !path.exists() {
            crate::log("coca_config.json not found. Using default config.");
            return AppConfig::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    crate::log(&format!(
                        "Config loaded: {} in {}, auto-detect {}",
                        config.preferences.crop_type,
                        config.preferences.planter_type,
                        config.preferences.auto_detect_crop
                    ));
                    config
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse coca_config.json: {}. Using defaults.",
                        e
                    ));
                    AppConfig::default()
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read coca_config.json: {}. Using defaults.",
                    e
                ));
                AppConfig::default()
            }
        }
    }

    /// Writes the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        crate::log("Saved config");
        Ok(())
    }

    /// The stored area, if it is usable for capture.
    pub fn capture_area(&self) -> Option<ScreenRect> {
        self.selected_area.filter(|rect| rect.validate().is_ok())
    }
}
