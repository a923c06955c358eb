//! Button-box key tables.
//!
//! Two presets exist and a session uses exactly one of them. The order of the
//! bindings matters: it doubles as the rating scale on `rate` trials.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskError};

/// Row/column offset plus the "select" flag carried by a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEffect {
    pub dr: i8,
    pub dc: i8,
    pub action: bool,
}

impl KeyEffect {
    pub const ACTION: KeyEffect = KeyEffect::new(0, 0, true);
    pub const LEFT: KeyEffect = KeyEffect::new(0, -1, false);
    pub const UP: KeyEffect = KeyEffect::new(-1, 0, false);
    pub const DOWN: KeyEffect = KeyEffect::new(1, 0, false);
    pub const RIGHT: KeyEffect = KeyEffect::new(0, 1, false);
    pub const NONE: KeyEffect = KeyEffect::new(0, 0, false);

    pub const fn new(dr: i8, dc: i8, action: bool) -> Self {
        Self { dr, dc, action }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Press(KeyEffect),
    Quit,
}

impl KeyCommand {
    /// Effect on the cursor. Quit neither moves nor selects.
    pub fn effect(self) -> KeyEffect {
        match self {
            KeyCommand::Press(e) => e,
            KeyCommand::Quit => KeyEffect::NONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPreset {
    /// fMRI button box.
    #[default]
    Scanner,
    /// Home-row keys for practice outside the scanner.
    Laptop,
}

impl KeyPreset {
    pub fn name(self) -> &'static str {
        match self {
            KeyPreset::Scanner => "scanner",
            KeyPreset::Laptop => "laptop",
        }
    }

    fn keys(self) -> [&'static str; 6] {
        match self {
            KeyPreset::Scanner => ["0", "1", "2", "3", "4", "q"],
            KeyPreset::Laptop => ["space", "j", "k", "l", "semicolon", "q"],
        }
    }
}

impl FromStr for KeyPreset {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scanner" | "scan" => Ok(KeyPreset::Scanner),
            "laptop" => Ok(KeyPreset::Laptop),
            other => Err(format!("unknown key preset {other:?} (expected scanner|laptop)")),
        }
    }
}

impl fmt::Display for KeyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const COMMANDS: [KeyCommand; 6] = [
    KeyCommand::Press(KeyEffect::ACTION),
    KeyCommand::Press(KeyEffect::LEFT),
    KeyCommand::Press(KeyEffect::UP),
    KeyCommand::Press(KeyEffect::DOWN),
    KeyCommand::Press(KeyEffect::RIGHT),
    KeyCommand::Quit,
];

/// The active key table. Built once from a preset and passed by reference to
/// everything that interprets key names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap {
    preset: KeyPreset,
    keys: [&'static str; 6],
}

impl KeyMap {
    pub fn new(preset: KeyPreset) -> Self {
        Self {
            preset,
            keys: preset.keys(),
        }
    }

    pub fn preset(&self) -> KeyPreset {
        self.preset
    }

    /// Every bound key, in table order.
    pub fn keys(&self) -> &[&'static str] {
        &self.keys
    }

    /// Bound keys that carry a response (everything except quit).
    pub fn response_keys(&self) -> &[&'static str] {
        &self.keys[..self.keys.len() - 1]
    }

    pub fn quit_key(&self) -> &'static str {
        self.keys[self.keys.len() - 1]
    }

    pub fn action_key(&self) -> &'static str {
        self.keys[0]
    }

    pub fn is_quit(&self, key: &str) -> bool {
        key == self.quit_key()
    }

    pub fn lookup(&self, key: &str) -> Result<KeyCommand> {
        self.position(key)
            .map(|i| COMMANDS[i])
            .ok_or_else(|| TaskError::UnknownInput {
                key: key.to_string(),
                preset: self.preset.name(),
            })
    }

    /// Ordinal rating for `key` on the five-point scale, `None` for quit or
    /// unbound keys.
    pub fn rating_index(&self, key: &str) -> Option<usize> {
        self.response_keys().iter().position(|k| *k == key)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| *k == key)
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new(KeyPreset::default())
    }
}
