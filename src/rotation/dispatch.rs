//! Key dispatch with randomized pacing.
//!
//! Every press is gated on the foreground check and followed by a random
//! delay, so presses never land in another application and never arrive at a
//! fixed cadence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::capture::ForegroundOracle;
use crate::rotation::config::DelayConfig;
use crate::rotation::input::{KeyCombo, KeySender};

/// Gap between repeated presses of a cast-time ability.
const CAST_REPRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Result of one dispatch attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Target not in the foreground; nothing was sent
    NotForeground,
    Sent,
    /// The platform rejected the key event (already logged)
    Failed,
}

pub struct ActionDispatcher {
    keys: Box<dyn KeySender>,
    oracle: Arc<dyn ForegroundOracle>,
    min_delay: f64,
    max_delay: f64,
    /// Delay applied after the next successful press, in seconds
    current_delay: f64,
    rng: StdRng,
}

impl ActionDispatcher {
    pub fn new(keys: Box<dyn KeySender>, oracle: Arc<dyn ForegroundOracle>, delay: DelayConfig) -> Self {
        Self::with_rng(keys, oracle, delay, StdRng::from_entropy())
    }

    /// Creates a dispatcher with a reproducible delay sequence.
    #[cfg(test)]
    pub fn with_seed(
        keys: Box<dyn KeySender>,
        oracle: Arc<dyn ForegroundOracle>,
        delay: DelayConfig,
        seed: u64,
    ) -> Self {
        Self::with_rng(keys, oracle, delay, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        keys: Box<dyn KeySender>,
        oracle: Arc<dyn ForegroundOracle>,
        delay: DelayConfig,
        mut rng: StdRng,
    ) -> Self {
        let (min_delay, max_delay) = sanitize_delay(delay);
        let current_delay = rng.gen_range(min_delay..=max_delay);
        Self {
            keys,
            oracle,
            min_delay,
            max_delay,
            current_delay,
            rng,
        }
    }

    /// Delay that will follow the next successful press.
    pub fn current_delay(&self) -> Duration {
        Duration::from_secs_f64(self.current_delay)
    }

    /// Sends `key` once if the target is in the foreground, then sleeps the
    /// current delay and draws the next one.
    pub fn dispatch(&mut self, key: &KeyCombo) -> DispatchOutcome {
        if !self.oracle.is_target_foreground() {
            return DispatchOutcome::NotForeground;
        }

        if let Err(e) = self.keys.press(key) {
            crate::log(&format!("Failed to press {}: {}", key, e));
            return DispatchOutcome::Failed;
        }

        thread::sleep(self.current_delay());
        self.current_delay = self.rng.gen_range(self.min_delay..=self.max_delay);
        DispatchOutcome::Sent
    }

    /// Keeps pressing `key` until `duration` has passed, for abilities that
    /// need the key held through a cast.
    ///
    /// Always attempts at least one press. Stops early when the target leaves
    /// the foreground or `should_stop` returns true. Returns the number of
    /// presses sent.
    pub fn dispatch_for(&mut self, key: &KeyCombo, duration: Duration, should_stop: &dyn Fn() -> bool) -> usize {
        let started = Instant::now();
        let mut sent = 0;
        loop {
            match self.dispatch(key) {
                DispatchOutcome::Sent => sent += 1,
                DispatchOutcome::Failed => {}
                DispatchOutcome::NotForeground => break,
            }
            if started.elapsed() >= duration || should_stop() {
                break;
            }
            thread::sleep(CAST_REPRESS_INTERVAL);
        }
        sent
    }
}

/// Orders the bounds and replaces unusable values with the defaults.
fn sanitize_delay(delay: DelayConfig) -> (f64, f64) {
    if !delay.min.is_finite() || !delay.max.is_finite() {
        crate::log(&format!(
            "Invalid press delay {:?}, using defaults",
            delay
        ));
        let defaults = DelayConfig::default();
        return (defaults.min, defaults.max);
    }
    let min = delay.min.min(delay.max).max(0.0);
    let max = delay.min.max(delay.max).max(0.0);
    (min, max)
}
