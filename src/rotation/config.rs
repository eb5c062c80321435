//! Configuration types for the rotation engine.
//!
//! Loads settings from config.json next to the executable. Provides the capture
//! region, pacing, tone-mapping and matching parameters, press delays, and
//! per-ability overrides.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::Region;

/// Capture rectangle given by two screen corners. `x2`/`y2` are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            x1: 0,
            y1: 0,
            x2: 80,
            y2: 200,
        }
    }
}

/// Random delay after each key press, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelayConfig {
    pub min: f64,
    pub max: f64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            min: 0.069,
            max: 0.160,
        }
    }
}

/// When a matched ability's key is pressed in Run mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressPolicy {
    /// Press on every tick the ability stays matched
    EveryTick,
    /// Press only when the matched ability changes
    #[default]
    OnTransition,
}

/// Per-ability adjustments applied before the threshold comparison.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityOverride {
    /// Subtracted from the match score (offsets icons prone to false positives)
    pub score_penalty: f32,
    /// Replaces the keybinding threshold for this ability
    pub threshold: Option<f32>,
    /// Keep re-pressing the key for this long after a match (cast-time abilities)
    pub cast_time_ms: Option<u64>,
}

/// Complete rotation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Screen rectangle holding the suggested-ability icon
    pub region: RegionConfig,
    /// Ticks per second
    pub fps: u32,
    /// Extra darkening after tone mapping (0.1 - 5.0)
    pub dark_factor: f32,
    /// Apply HDR tone mapping to each capture
    pub tone_mapping: bool,
    /// Template zoom (0.1 - 5.0)
    pub scale: f32,
    /// Delay range after each key press
    pub delay: DelayConfig,
    /// Back-off when the target window is not in the foreground (milliseconds)
    pub no_frame_backoff_ms: u64,
    /// Executable name of the game process
    pub target_process: String,
    /// Key that must be held for Run mode to press anything
    pub activation_hotkey: String,
    /// Threshold for keybinding entries without one
    pub default_threshold: f32,
    pub press_policy: PressPolicy,
    /// Keybinding file, relative to the executable directory
    pub keybinding_file: PathBuf,
    /// Icon directories, relative to the executable directory; later ones override earlier ones
    pub icon_dirs: Vec<PathBuf>,
    pub overrides: HashMap<String, AbilityOverride>,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            region: RegionConfig::default(),
            fps: 10,
            dark_factor: 0.3,
            tone_mapping: true,
            scale: 1.0,
            delay: DelayConfig::default(),
            no_frame_backoff_ms: 1000,
            target_process: "Wow.exe".to_string(),
            activation_hotkey: "xbutton1".to_string(),
            default_threshold: 0.8,
            press_policy: PressPolicy::default(),
            keybinding_file: PathBuf::from("keybindings.json"),
            icon_dirs: vec![PathBuf::from("icons/base")],
            overrides: HashMap::new(),
        }
    }
}

impl RotationConfig {
    /// Capture region in screen pixels.
    pub fn capture_region(&self) -> Result<Region> {
        let r = &self.region;
        Region::from_corners(r.x1, r.y1, r.x2, r.y2)
    }

    /// Fixed pause between ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.fps.max(1)))
    }

    pub fn no_frame_backoff(&self) -> Duration {
        Duration::from_millis(self.no_frame_backoff_ms)
    }
}

/// Loads configuration from `path` or returns defaults.
pub fn load_config(path: &Path) -> RotationConfig {
    crate::log(&format!("Looking for config at: {}", path.display()));

    if !path.exists() {
        crate::log("config.json not found. Using default config.");
        return RotationConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                crate::log("Config loaded from config.json");
                config
            }
            Err(e) => {
                crate::log(&format!(
                    "Failed to parse config.json: {}. Using defaults.",
                    e
                ));
                RotationConfig::default()
            }
        },
        Err(e) => {
            crate::log(&format!(
                "Failed to read config.json: {}. Using defaults.",
                e
            ));
            RotationConfig::default()
        }
    }
}
