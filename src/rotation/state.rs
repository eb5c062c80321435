//! Engine modes and the control block shared with the worker thread.
//!
//! The worker reads the mode and the stop flag at tick boundaries; the
//! controlling thread writes them. Both are plain atomics.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep before the stop flag is checked again.
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Engine modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No worker running
    Stopped,
    /// Match and notify, never press keys
    Preview,
    /// Match, notify, and press keys while the activation hotkey is held
    Run,
}

impl EngineState {
    fn to_u8(self) -> u8 {
        match self {
            EngineState::Stopped => 0,
            EngineState::Preview => 1,
            EngineState::Run => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => EngineState::Preview,
            2 => EngineState::Run,
            _ => EngineState::Stopped,
        }
    }

    /// Parses a console command word into a mode.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "stopped" | "stop" => Some(EngineState::Stopped),
            "preview" => Some(EngineState::Preview),
            "run" => Some(EngineState::Run),
            _ => None,
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "Stopped"),
            EngineState::Preview => write!(f, "Preview"),
            EngineState::Run => write!(f, "Run"),
        }
    }
}

/// Mode and stop request for one worker lifetime.
#[derive(Debug)]
pub struct EngineControl {
    mode: AtomicU8,
    stop_requested: AtomicBool,
}

impl EngineControl {
    pub fn new(mode: EngineState) -> Self {
        Self {
            mode: AtomicU8::new(mode.to_u8()),
            stop_requested: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> EngineState {
        EngineState::from_u8(self.mode.load(Ordering::SeqCst))
    }

    pub fn set_mode(&self, mode: EngineState) {
        self.mode.store(mode.to_u8(), Ordering::SeqCst);
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` in short slices.
    ///
    /// Returns `false` if a stop was requested before the time ran out.
    pub fn sleep_unless_stopped(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.stop_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", EngineState::Stopped), "Stopped");
        assert_eq!(format!("{}", EngineState::Preview), "Preview");
        assert_eq!(format!("{}", EngineState::Run), "Run");
    }

    #[test]
    fn test_state_parse() {
        assert_eq!(EngineState::parse(" Run "), Some(EngineState::Run));
        assert_eq!(EngineState::parse("preview"), Some(EngineState::Preview));
        assert_eq!(EngineState::parse("stop"), Some(EngineState::Stopped));
        assert_eq!(EngineState::parse("pause"), None);
    }

    #[test]
    fn test_control_round_trips_modes() {
        let control = EngineControl::new(EngineState::Preview);
        assert_eq!(control.mode(), EngineState::Preview);
        control.set_mode(EngineState::Run);
        assert_eq!(control.mode(), EngineState::Run);
        control.set_mode(EngineState::Stopped);
        assert_eq!(control.mode(), EngineState::Stopped);
    }

    #[test]
    fn test_sleep_completes_without_stop() {
        let control = EngineControl::new(EngineState::Run);
        let started = Instant::now();
        assert!(control.sleep_unless_stopped(Duration::from_millis(60)));
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_sleep_wakes_on_stop() {
        let control = Arc::new(EngineControl::new(EngineState::Run));
        let stopper = control.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            stopper.request_stop();
        });

        let started = Instant::now();
        assert!(!control.sleep_unless_stopped(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }
}
