//! Rotation Assist
//!
//! Watches the suggested-ability icon in a fixed screen region, matches it
//! against the icons of the bound abilities, and presses the bound key while
//! the activation hotkey is held. Controlled from the console.

mod capture;
mod paths;
mod rotation;
#[cfg(test)]
mod testing;

use anyhow::{bail, Context, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::capture::FrameSource;
use crate::rotation::{
    build_library, create_hotkey_probe, create_key_sender, load_config, load_icons,
    load_keybindings, ActionDispatcher, EngineFactory, EngineRunner, EngineSettings,
    EngineState, KeyCombo, MatchEvent, RotationConfig, RotationEngine,
};

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("rotation_assist.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

const HELP: &str = "Commands: preview | run | start | stop | status | help | quit";

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        log(&format!("[PANIC]{} {}", location, msg));
    }));

    paths::ensure_directories()?;

    let config = load_config(&paths::get_config_path());
    // Fail fast on settings that would stop every engine build
    EngineSettings::from_config(&config)?;
    KeyCombo::parse(&config.activation_hotkey).context("Invalid activation hotkey")?;
    log(&format!(
        "Target process: {}, activation hotkey: {}, press policy: {:?}",
        config.target_process, config.activation_hotkey, config.press_policy
    ));

    let mut runner = EngineRunner::new(engine_factory(config));
    runner.on_match(|ability| log(&format!("Match observed: {}", ability)));
    let events = runner.match_events();
    let mut last_seen: Option<MatchEvent> = None;

    log(HELP);
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read command")?;
        let command = line.trim().to_lowercase();
        match command.as_str() {
            "" => {}
            "quit" | "exit" => break,
            "help" => log(HELP),
            "status" => {
                if let Some(event) = events.try_iter().last() {
                    last_seen = Some(event);
                }
                let seen = match &last_seen {
                    Some(event) => format!(
                        "{} at {}",
                        event.ability,
                        event.observed_at.format("%H:%M:%S%.3f")
                    ),
                    None => "none".to_string(),
                };
                log(&format!("Engine state: {}, last match: {}", runner.state(), seen));
            }
            "start" => {
                if let Err(e) = runner.start() {
                    log(&format!("Cannot start: {}", e));
                }
            }
            other => match EngineState::parse(other) {
                Some(EngineState::Stopped) => runner.stop(),
                Some(mode) => {
                    runner.set_mode(mode);
                    if !runner.is_running() {
                        if let Err(e) = runner.start() {
                            log(&format!("Cannot start: {}", e));
                        }
                    }
                    log(&format!("Mode: {}", mode));
                }
                None => log(&format!("Unknown command \"{}\". {}", other, HELP)),
            },
        }
    }

    runner.stop();
    log("Exiting");
    Ok(())
}

/// Builds a fresh engine from `config` each time the runner starts.
fn engine_factory(config: RotationConfig) -> EngineFactory {
    Arc::new(move || build_engine(&config))
}

fn build_engine(config: &RotationConfig) -> Result<RotationEngine> {
    let settings = EngineSettings::from_config(config)?;

    let bindings = load_keybindings(
        &paths::resolve(&config.keybinding_file),
        config.default_threshold,
    )?;
    let abilities: Vec<&str> = bindings.iter().map(|b| b.name.as_str()).collect();
    let icon_dirs: Vec<PathBuf> = config.icon_dirs.iter().map(|d| paths::resolve(d)).collect();
    let icons = load_icons(&icon_dirs, &abilities);

    let library = build_library(&bindings, icons)?;
    if library.is_empty() {
        bail!("No ability has both a keybinding and an icon");
    }
    log(&format!("Template library ready: {} abilities", library.len()));

    let hotkey = KeyCombo::parse(&config.activation_hotkey).context("Invalid activation hotkey")?;
    let oracle = capture::create_foreground_oracle(&config.target_process);
    let frames = FrameSource::new(capture::create_screen_grabber(), oracle.clone());
    let dispatcher = ActionDispatcher::new(create_key_sender(), oracle, config.delay);

    Ok(RotationEngine::new(
        settings,
        library,
        frames,
        dispatcher,
        create_hotkey_probe(&hotkey),
    ))
}
