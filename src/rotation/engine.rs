//! The rotation engine: capture → tone-map → match → maybe press, once per tick.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::capture::{FrameSource, Region};
use crate::rotation::config::{AbilityOverride, PressPolicy, RotationConfig};
use crate::rotation::dispatch::{ActionDispatcher, DispatchOutcome};
use crate::rotation::input::HotkeyProbe;
use crate::rotation::library::TemplateLibrary;
use crate::rotation::matcher::TemplateMatcher;
use crate::rotation::queue::MatchNotifier;
use crate::rotation::state::{EngineControl, EngineState};
use crate::rotation::tone;

/// Per-engine settings derived from `RotationConfig`.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub region: Region,
    pub tick_interval: Duration,
    pub no_frame_backoff: Duration,
    pub tone_mapping: bool,
    pub dark_factor: f32,
    pub scale: f32,
    pub press_policy: PressPolicy,
    pub overrides: HashMap<String, AbilityOverride>,
}

impl EngineSettings {
    /// # Errors
    /// Returns an error if the capture region is empty or `dark_factor` is
    /// negative or non-finite.
    pub fn from_config(config: &RotationConfig) -> Result<Self> {
        tone::check_dark_factor(config.dark_factor)?;
        Ok(Self {
            region: config.capture_region()?,
            tick_interval: config.tick_interval(),
            no_frame_backoff: config.no_frame_backoff(),
            tone_mapping: config.tone_mapping,
            dark_factor: config.dark_factor,
            scale: config.scale,
            press_policy: config.press_policy,
            overrides: config.overrides.clone(),
        })
    }
}

/// What one tick did.
#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// Engine is stopped; nothing was captured
    Idle,
    /// Target not in the foreground or capture failed
    NoFrame,
    /// Nothing cleared its threshold
    NoMatch { score: f32 },
    Matched {
        ability: String,
        /// Score after any penalty
        score: f32,
        /// A "match observed" notification went out this tick
        notified: bool,
        /// At least one key event was sent this tick
        pressed: bool,
    },
}

pub struct RotationEngine {
    settings: EngineSettings,
    library: TemplateLibrary,
    matcher: TemplateMatcher,
    frames: FrameSource,
    dispatcher: ActionDispatcher,
    hotkey: Box<dyn HotkeyProbe>,
    notifier: MatchNotifier,
    /// Ability reported by the last notification
    last_match: Option<String>,
    /// Ability whose key was pressed last, while the hotkey stayed held
    last_pressed: Option<String>,
}

impl RotationEngine {
    pub fn new(
        settings: EngineSettings,
        library: TemplateLibrary,
        frames: FrameSource,
        dispatcher: ActionDispatcher,
        hotkey: Box<dyn HotkeyProbe>,
    ) -> Self {
        Self {
            settings,
            library,
            matcher: TemplateMatcher::new(),
            frames,
            dispatcher,
            hotkey,
            notifier: MatchNotifier::new(),
            last_match: None,
            last_pressed: None,
        }
    }

    pub fn set_notifier(&mut self, notifier: MatchNotifier) {
        self.notifier = notifier;
    }

    #[cfg(test)]
    pub fn last_match(&self) -> Option<&str> {
        self.last_match.as_deref()
    }

    /// Runs one capture/match/press cycle in `mode`.
    ///
    /// `should_stop` is polled during long presses (cast-time abilities).
    pub fn tick(
        &mut self,
        mode: EngineState,
        should_stop: &dyn Fn() -> bool,
    ) -> Result<TickOutcome> {
        if mode == EngineState::Stopped {
            return Ok(TickOutcome::Idle);
        }

        let Some(frame) = self.frames.capture(&self.settings.region) else {
            return Ok(TickOutcome::NoFrame);
        };
        let frame = if self.settings.tone_mapping {
            tone::correct(&frame, self.settings.dark_factor)
        } else {
            frame
        };

        let result = self
            .matcher
            .match_best(&frame, self.library.templates(), self.settings.scale);
        let Some(name) = result.name else {
            self.clear_match();
            return Ok(TickOutcome::NoMatch {
                score: result.score,
            });
        };

        let template = self
            .library
            .get(&name)
            .ok_or_else(|| anyhow!("Matched unknown template '{}'", name))?;
        let bound_key = template.bound_key.clone();
        let overrides = self.settings.overrides.get(&name);
        let threshold = overrides
            .and_then(|o| o.threshold)
            .unwrap_or(template.threshold);
        let score = result.score - overrides.map_or(0.0, |o| o.score_penalty);
        if score < threshold {
            self.clear_match();
            return Ok(TickOutcome::NoMatch { score });
        }

        let is_new = self.last_match.as_deref() != Some(name.as_str());
        if is_new {
            self.notifier.notify(&name);
            self.last_match = Some(name.clone());
        }

        let mut pressed = false;
        if mode == EngineState::Run {
            if !self.hotkey.is_held() {
                self.last_pressed = None;
            } else if let Some(key) = bound_key {
                let repeat = self.last_pressed.as_deref() == Some(name.as_str());
                if !(repeat && self.settings.press_policy == PressPolicy::OnTransition) {
                    if !repeat {
                        crate::log(&format!(
                            "Press \"{}\" for \"{}\" (score {:.3})",
                            key, name, score
                        ));
                    }
                    let cast_time = overrides.and_then(|o| o.cast_time_ms);
                    pressed = match cast_time {
                        Some(ms) => {
                            self.dispatcher
                                .dispatch_for(&key, Duration::from_millis(ms), should_stop)
                                > 0
                        }
                        None => self.dispatcher.dispatch(&key) == DispatchOutcome::Sent,
                    };
                    if pressed {
                        self.last_pressed = Some(name.clone());
                    }
                }
            } else if is_new {
                crate::log(&format!("No key bound for \"{}\", not pressing", name));
            }
        }

        Ok(TickOutcome::Matched {
            ability: name,
            score,
            notified: is_new,
            pressed,
        })
    }

    fn clear_match(&mut self) {
        self.last_match = None;
        self.last_pressed = None;
    }

    /// Ticks until `control` requests a stop.
    ///
    /// Errors and panics inside a tick are logged and the tick is skipped.
    pub fn run(&mut self, control: &EngineControl) {
        crate::log(&format!("Rotation engine started in {} mode", control.mode()));
        let mut mode = control.mode();

        while !control.stop_requested() {
            let started = Instant::now();
            let current = control.mode();
            if current != mode {
                crate::log(&format!("Mode changed: {} -> {}", mode, current));
                mode = current;
            }

            let should_stop = || control.stop_requested();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.tick(mode, &should_stop)));
            let pause = match outcome {
                Ok(Ok(TickOutcome::NoFrame)) => self.settings.no_frame_backoff,
                Ok(Ok(_)) => self.settings.tick_interval.saturating_sub(started.elapsed()),
                Ok(Err(e)) => {
                    crate::log(&format!("Tick failed: {:#}", e));
                    self.settings.tick_interval
                }
                Err(payload) => {
                    crate::log(&format!("Tick panicked: {}", panic_message(payload.as_ref())));
                    self.settings.tick_interval
                }
            };

            if !control.sleep_unless_stopped(pause) {
                break;
            }
        }

        crate::log("Rotation engine stopped");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
