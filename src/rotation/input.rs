//! Keyboard input for ability presses and the activation hotkey.
//!
//! Key strings from the keybinding file ("q", "Shift + 1", "Ctrl+F2") are parsed
//! once into a `KeyCombo`. Platform code turns combos into virtual-key events:
//! - Windows: `SendInput` for presses, `GetAsyncKeyState` for the hotkey
//! - Elsewhere: logging stubs that never report the hotkey as held

use anyhow::{anyhow, bail, Result};
use std::fmt;

/// A modifier held while the main key is tapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
}

impl Modifier {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "shift" => Some(Modifier::Shift),
            "alt" | "menu" => Some(Modifier::Alt),
            _ => None,
        }
    }

    /// Windows virtual-key code.
    pub fn vk(self) -> u16 {
        match self {
            Modifier::Ctrl => 0x11,
            Modifier::Shift => 0x10,
            Modifier::Alt => 0x12,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Ctrl => write!(f, "Ctrl"),
            Modifier::Shift => write!(f, "Shift"),
            Modifier::Alt => write!(f, "Alt"),
        }
    }
}

/// A main key plus zero or more modifiers, e.g. `Shift+1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyCombo {
    pub modifiers: Vec<Modifier>,
    /// Lowercase key name, always present in the virtual-key table
    pub key: String,
}

impl KeyCombo {
    /// Parses a key string such as `"q"`, `"Shift + 1"` or `"ctrl+f2"`.
    ///
    /// A bare modifier ("Shift") is accepted as a main key so it can serve as
    /// the activation hotkey.
    pub fn parse(text: &str) -> Result<Self> {
        let lowered = text.trim().to_lowercase();
        if lowered.is_empty() {
            bail!("Empty key string");
        }

        // A trailing "+" means the plus key itself ("Shift + +")
        let (head, key) = match lowered.strip_suffix('+') {
            Some(rest) if rest.trim_end().ends_with('+') || rest.trim().is_empty() => {
                (rest.trim_end().trim_end_matches('+'), "+".to_string())
            }
            _ => match lowered.rsplit_once('+') {
                Some((head, key)) => (head, key.trim().to_string()),
                None => ("", lowered.clone()),
            },
        };

        if virtual_key_code(&key).is_none() {
            bail!("Unknown key \"{}\" in \"{}\"", key, text);
        }

        let mut modifiers = Vec::new();
        for part in head.split('+').map(str::trim).filter(|p| !p.is_empty()) {
            let modifier = Modifier::parse(part)
                .ok_or_else(|| anyhow!("Unknown modifier \"{}\" in \"{}\"", part, text))?;
            if !modifiers.contains(&modifier) {
                modifiers.push(modifier);
            }
        }

        Ok(Self { modifiers, key })
    }

    /// Virtual-key codes of every key in the combo, modifiers first.
    pub fn virtual_keys(&self) -> Vec<u16> {
        let mut vks: Vec<u16> = self.modifiers.iter().map(|m| m.vk()).collect();
        if let Some(vk) = virtual_key_code(&self.key) {
            vks.push(vk);
        }
        vks
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{}+", modifier)?;
        }
        write!(f, "{}", self.key)
    }
}

/// Maps a lowercase key name to its Windows virtual-key code.
pub fn virtual_key_code(name: &str) -> Option<u16> {
    let code = match name {
        // Mouse buttons, only meaningful for the activation hotkey
        "lbutton" => 0x01,
        "rbutton" => 0x02,
        "mbutton" => 0x04,
        "xbutton1" | "mouse4" => 0x05,
        "xbutton2" | "mouse5" => 0x06,
        // Editing and navigation
        "backspace" => 0x08,
        "tab" => 0x09,
        "enter" | "return" => 0x0D,
        "shift" => 0x10,
        "ctrl" | "control" => 0x11,
        "alt" => 0x12,
        "pause" => 0x13,
        "capslock" => 0x14,
        "esc" | "escape" => 0x1B,
        "space" => 0x20,
        "pageup" | "pgup" => 0x21,
        "pagedown" | "pgdn" => 0x22,
        "end" => 0x23,
        "home" => 0x24,
        "left" => 0x25,
        "up" => 0x26,
        "right" => 0x27,
        "down" => 0x28,
        "insert" | "ins" => 0x2D,
        "delete" | "del" => 0x2E,
        // Punctuation (US layout)
        ";" => 0xBA,
        "=" => 0xBB,
        "," => 0xBC,
        "-" => 0xBD,
        "." => 0xBE,
        "/" => 0xBF,
        "`" => 0xC0,
        "[" => 0xDB,
        "\\" => 0xDC,
        "]" => 0xDD,
        "'" => 0xDE,
        "+" => 0xBB,
        _ => return named_key_code(name),
    };
    Some(code)
}

/// Letters, digits, function keys and numpad keys.
fn named_key_code(name: &str) -> Option<u16> {
    let bytes = name.as_bytes();
    if bytes.len() == 1 {
        let c = bytes[0];
        if c.is_ascii_lowercase() {
            return Some(u16::from(c.to_ascii_uppercase()));
        }
        if c.is_ascii_digit() {
            return Some(u16::from(c));
        }
        return None;
    }

    if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<u16>().ok()) {
        if (1..=24).contains(&n) {
            return Some(0x70 + n - 1);
        }
    }
    if let Some(n) = name.strip_prefix("num").and_then(|n| n.parse::<u16>().ok()) {
        if n <= 9 {
            return Some(0x60 + n);
        }
    }
    None
}

/// Sends key presses to the focused window.
pub trait KeySender: Send {
    fn press(&mut self, key: &KeyCombo) -> Result<()>;
}

/// Reports whether the activation hotkey is physically held right now.
pub trait HotkeyProbe: Send {
    fn is_held(&self) -> bool;
}

/// Creates the key sender for the current OS.
pub fn create_key_sender() -> Box<dyn KeySender> {
    #[cfg(windows)]
    {
        Box::new(platform::SendInputKeys)
    }
    #[cfg(not(windows))]
    {
        Box::new(platform::StubKeys)
    }
}

/// Creates the activation hotkey probe for the current OS.
pub fn create_hotkey_probe(hotkey: &KeyCombo) -> Box<dyn HotkeyProbe> {
    #[cfg(windows)]
    {
        Box::new(platform::AsyncKeyHotkey::new(hotkey))
    }
    #[cfg(not(windows))]
    {
        Box::new(platform::StubHotkey::new(hotkey))
    }
}

#[cfg(windows)]
mod platform {
    use anyhow::{bail, Result};

    use windows::Win32::UI::Input::KeyboardAndMouse::{
        GetAsyncKeyState, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT,
        KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP, VIRTUAL_KEY,
    };

    use super::{HotkeyProbe, KeyCombo, KeySender};

    fn key_input(vk: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    /// Hardware-level key events via `SendInput`.
    pub struct SendInputKeys;

    impl KeySender for SendInputKeys {
        fn press(&mut self, key: &KeyCombo) -> Result<()> {
            let vks = key.virtual_keys();
            if vks.iter().any(|&vk| vk <= 0x06) {
                bail!("Mouse buttons cannot be sent as key presses: {}", key);
            }

            // Modifiers down, key down, key up, modifiers up in reverse
            let mut inputs: Vec<INPUT> = vks
                .iter()
                .map(|&vk| key_input(vk, KEYBD_EVENT_FLAGS(0)))
                .collect();
            inputs.extend(vks.iter().rev().map(|&vk| key_input(vk, KEYEVENTF_KEYUP)));

            let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
            if sent as usize != inputs.len() {
                bail!("SendInput sent {} of {} events for {}", sent, inputs.len(), key);
            }
            Ok(())
        }
    }

    /// Polls the physical key state of every key in the hotkey combo.
    pub struct AsyncKeyHotkey {
        vks: Vec<u16>,
    }

    impl AsyncKeyHotkey {
        pub fn new(hotkey: &KeyCombo) -> Self {
            Self {
                vks: hotkey.virtual_keys(),
            }
        }
    }

    impl HotkeyProbe for AsyncKeyHotkey {
        fn is_held(&self) -> bool {
            !self.vks.is_empty()
                && self
                    .vks
                    .iter()
                    .all(|&vk| unsafe { GetAsyncKeyState(i32::from(vk)) } as u16 & 0x8000 != 0)
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use anyhow::Result;

    use super::{HotkeyProbe, KeyCombo, KeySender};

    pub struct StubKeys;

    impl KeySender for StubKeys {
        fn press(&mut self, key: &KeyCombo) -> Result<()> {
            crate::log(&format!("stub: press(\"{}\")", key));
            Ok(())
        }
    }

    pub struct StubHotkey;

    impl StubHotkey {
        pub fn new(hotkey: &KeyCombo) -> Self {
            crate::log(&format!("stub: hotkey \"{}\" is never held", hotkey));
            Self
        }
    }

    impl HotkeyProbe for StubHotkey {
        fn is_held(&self) -> bool {
            false
        }
    }
}
