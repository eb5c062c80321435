//! Engine runner: owns the worker thread that drives `RotationEngine::run`.
//!
//! Each `start()` builds a fresh engine from the factory on the worker thread,
//! so templates, the scaled cache and pixel buffers never leave it. `stop()`
//! joins the worker, which drops the engine.

use anyhow::{bail, Context, Result};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::rotation::engine::RotationEngine;
use crate::rotation::queue::{create_match_channel, MatchEvent, MatchNotifier, MatchSink};
use crate::rotation::state::{EngineControl, EngineState};

/// Builds an engine for one worker lifetime. Called on the worker thread.
pub type EngineFactory = Arc<dyn Fn() -> Result<RotationEngine> + Send + Sync>;

struct Worker {
    control: Arc<EngineControl>,
    handle: JoinHandle<()>,
}

pub struct EngineRunner {
    factory: EngineFactory,
    notifier: MatchNotifier,
    /// Mode used by the next `start()`
    mode: EngineState,
    worker: Option<Worker>,
}

impl EngineRunner {
    pub fn new(factory: EngineFactory) -> Self {
        Self {
            factory,
            notifier: MatchNotifier::new(),
            mode: EngineState::Preview,
            worker: None,
        }
    }

    /// Registers a callback for "match observed" events.
    ///
    /// The callback runs on the worker thread. A running worker sees it from
    /// its next notification on.
    pub fn on_match<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.notifier.add(MatchSink::Callback(Arc::new(callback)));
    }

    /// Returns a receiver for "match observed" events, live on a running worker too.
    pub fn match_events(&self) -> Receiver<MatchEvent> {
        let (sender, receiver) = create_match_channel();
        self.notifier.add(MatchSink::Channel(sender));
        receiver
    }

    /// Spawns the worker in the current mode.
    ///
    /// # Errors
    /// Returns an error if:
    /// - A worker is already running
    /// - The worker thread cannot be spawned
    pub fn start(&mut self) -> Result<()> {
        self.reap_finished();
        if self.worker.is_some() {
            bail!("Rotation engine is already running");
        }

        let mode = match self.mode {
            EngineState::Stopped => EngineState::Preview,
            mode => mode,
        };
        self.mode = mode;

        let control = Arc::new(EngineControl::new(mode));
        let worker_control = control.clone();
        let notifier = self.notifier.clone();
        let factory = self.factory.clone();

        let handle = thread::Builder::new()
            .name("rotation-engine".to_string())
            .spawn(move || {
                match factory() {
                    Ok(mut engine) => {
                        engine.set_notifier(notifier);
                        engine.run(&worker_control);
                    }
                    Err(e) => crate::log(&format!("Failed to build rotation engine: {:#}", e)),
                }
                crate::log("Engine thread finished");
            })
            .context("Failed to spawn engine thread")?;

        crate::log(&format!("Rotation engine starting in {} mode", mode));
        self.worker = Some(Worker { control, handle });
        Ok(())
    }

    /// Stops the worker and waits for it to exit. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.control.request_stop();
        if let Err(e) = worker.handle.join() {
            crate::log(&format!("Engine thread panicked: {:?}", e));
        }
        crate::log("Rotation engine stopped");
    }

    /// Switches mode. `Stopped` stops the worker; other modes apply at the
    /// next tick, or at the next start when stopped.
    pub fn set_mode(&mut self, mode: EngineState) {
        if mode == EngineState::Stopped {
            self.stop();
            return;
        }
        self.mode = mode;
        if let Some(worker) = &self.worker {
            worker.control.set_mode(mode);
        }
    }

    /// Current mode, or `Stopped` when no worker is alive.
    pub fn state(&mut self) -> EngineState {
        self.reap_finished();
        match &self.worker {
            Some(worker) => worker.control.mode(),
            None => EngineState::Stopped,
        }
    }

    pub fn is_running(&mut self) -> bool {
        self.state() != EngineState::Stopped
    }

    /// Clears out a worker that exited on its own (e.g. the factory failed).
    fn reap_finished(&mut self) {
        if self
            .worker
            .as_ref()
            .is_some_and(|worker| worker.handle.is_finished())
        {
            self.stop();
        }
    }
}

impl Drop for EngineRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
