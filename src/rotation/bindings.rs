//! Keybinding file: ability name → key, optionally with a match threshold.
//!
//! Entries come in two shapes, `"q"` or `["q", 0.7]`. Both are resolved here,
//! once, into a uniform `AbilityBinding`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::rotation::input::KeyCombo;

/// One raw keybinding value as written in the file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum KeyBindingEntry {
    Key(String),
    KeyWithThreshold(String, f32),
}

/// A resolved binding for one ability.
#[derive(Clone, Debug, PartialEq)]
pub struct AbilityBinding {
    pub name: String,
    /// `None` when the key string is empty (ability is matched but never pressed)
    pub key: Option<KeyCombo>,
    pub threshold: f32,
}

impl KeyBindingEntry {
    /// Resolves the entry, filling in `default_threshold` when none is given.
    pub fn resolve(&self, name: &str, default_threshold: f32) -> Result<AbilityBinding> {
        let (key_text, threshold) = match self {
            KeyBindingEntry::Key(key) => (key.as_str(), default_threshold),
            KeyBindingEntry::KeyWithThreshold(key, threshold) => (key.as_str(), *threshold),
        };

        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("Threshold {} for '{}' is outside [0, 1]", threshold, name);
        }

        let key = if key_text.trim().is_empty() {
            None
        } else {
            Some(KeyCombo::parse(key_text).with_context(|| format!("Invalid key for '{}'", name))?)
        };

        Ok(AbilityBinding {
            name: name.to_string(),
            key,
            threshold,
        })
    }
}

/// Parses keybinding JSON, preserving file order.
///
/// Malformed entries are logged and skipped so one typo does not disable the
/// whole rotation.
pub fn parse_keybindings(json: &str, default_threshold: f32) -> Result<Vec<AbilityBinding>> {
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).context("Keybinding file must be a JSON object")?;

    let mut bindings = Vec::with_capacity(map.len());
    for (name, value) in map {
        let resolved = serde_json::from_value::<KeyBindingEntry>(value)
            .map_err(anyhow::Error::from)
            .and_then(|entry| entry.resolve(&name, default_threshold));
        match resolved {
            Ok(binding) => bindings.push(binding),
            Err(e) => crate::log(&format!("Skipping keybinding '{}': {:#}", name, e)),
        }
    }
    Ok(bindings)
}

/// Loads and resolves the keybinding file.
pub fn load_keybindings(path: &Path, default_threshold: f32) -> Result<Vec<AbilityBinding>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read keybindings from {}", path.display()))?;
    let bindings = parse_keybindings(&contents, default_threshold)?;
    crate::log(&format!(
        "Loaded {} keybindings from {}",
        bindings.len(),
        path.display()
    ));
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_both_entry_shapes_resolve() {
        let bindings = parse_keybindings(
            r#"{"Fireball": "q", "Frostbolt": ["Shift + 2", 0.65], "Blink": ["", 0.5]}"#,
            0.8,
        )
        .unwrap();

        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[0].name, "Fireball");
        assert_eq!(bindings[0].key, Some(KeyCombo::parse("q").unwrap()));
        assert_eq!(bindings[0].threshold, 0.8);

        assert_eq!(bindings[1].name, "Frostbolt");
        assert_eq!(bindings[1].key.as_ref().unwrap().to_string(), "Shift+2");
        assert_eq!(bindings[1].threshold, 0.65);

        assert_eq!(bindings[2].key, None);
    }

    #[test]
    fn test_file_order_is_preserved() {
        let bindings = parse_keybindings(r#"{"zeta": "1", "alpha": "2", "mid": "3"}"#, 0.8).unwrap();
        let names: Vec<&str> = bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_bad_entries_are_skipped() {
        let bindings = parse_keybindings(
            r#"{"ok": "e", "badkey": "nope", "badthreshold": ["r", 1.5], "badshape": 42}"#,
            0.8,
        )
        .unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].name, "ok");
    }

    #[test]
    fn test_non_object_is_an_error() {
        assert!(parse_keybindings("[1, 2]", 0.8).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keybindings.json");
        std::fs::write(&path, r#"{"Fireball": ["q", 0.9]}"#).unwrap();

        let bindings = load_keybindings(&path, 0.8).unwrap();
        assert_eq!(bindings[0].threshold, 0.9);
        assert!(load_keybindings(&dir.path().join("missing.json"), 0.8).is_err());
    }
}
