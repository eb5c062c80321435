//! Rotation automation: watches the suggested-ability icon and presses its key.
//!
//! This module provides:
//! - Keybinding and config loading
//! - HDR tone correction and colour template matching
//! - Foreground-gated key dispatch with randomized pacing
//! - The tick engine and the worker-thread runner that drives it

pub mod bindings;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod input;
pub mod library;
pub mod matcher;
pub mod queue;
pub mod runner;
pub mod state;
pub mod tone;

pub use bindings::load_keybindings;
pub use config::{load_config, RotationConfig};
pub use dispatch::ActionDispatcher;
pub use engine::{EngineSettings, RotationEngine};
pub use input::{create_hotkey_probe, create_key_sender, KeyCombo};
pub use library::{build_library, load_icons};
pub use queue::MatchEvent;
pub use runner::{EngineFactory, EngineRunner};
pub use state::EngineState;
