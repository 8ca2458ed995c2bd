use std::fmt;
use std::str::FromStr;

use egui::{Key, Modifiers};
use serde::{Deserialize, Serialize};

use crate::error::HotKeyError;

/// A key plus modifiers, parsed from strings such as `"Control+Shift+A"`.
///
/// `Control` is matched against egui's platform command modifier, so the
/// same binding works with Cmd on macOS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HotKey {
    pub key: Key,
    pub command: bool,
    pub shift: bool,
    pub alt: bool,
}

impl HotKey {
    pub fn parse(binding: &str) -> Result<Self, HotKeyError> {
        let binding = binding.trim();
        if binding.is_empty() {
            return Err(HotKeyError::Empty);
        }

        let mut command = false;
        let mut shift = false;
        let mut alt = false;
        let mut key = None;

        for part in binding.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "control" | "ctrl" | "cmd" | "command" | "meta" => command = true,
                "shift" => shift = true,
                "alt" | "option" => alt = true,
                "" => return Err(HotKeyError::UnknownKey(binding.to_string())),
                _ => {
                    // Key names are case-sensitive in egui; letters are upper case.
                    let name = if part.chars().count() == 1 {
                        part.to_ascii_uppercase()
                    } else {
                        part.to_string()
                    };
                    key = Some(
                        Key::from_name(&name)
                            .ok_or_else(|| HotKeyError::UnknownKey(part.to_string()))?,
                    );
                }
            }
        }

        let key = key.ok_or_else(|| HotKeyError::MissingKey(binding.to_string()))?;
        Ok(Self {
            key,
            command,
            shift,
            alt,
        })
    }

    /// Exact match: every modifier in the binding is held and no others.
    pub fn matches(&self, key: Key, modifiers: Modifiers) -> bool {
        key == self.key
            && modifiers.command == self.command
            && modifiers.shift == self.shift
            && modifiers.alt == self.alt
    }

    /// True while the key is held, ignoring modifiers.
    pub fn is_held(&self, input: &egui::InputState) -> bool {
        input.key_down(self.key)
    }
}

impl FromStr for HotKey {
    type Err = HotKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HotKey::parse(s)
    }
}

impl TryFrom<String> for HotKey {
    type Error = HotKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HotKey::parse(&value)
    }
}

impl From<HotKey> for String {
    fn from(hotkey: HotKey) -> Self {
        hotkey.to_string()
    }
}

impl fmt::Display for HotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.command {
            write!(f, "Control+")?;
        }
        if self.shift {
            write!(f, "Shift+")?;
        }
        if self.alt {
            write!(f, "Alt+")?;
        }
        write!(f, "{}", self.key.name())
    }
}

/// Bindings used by the viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotKeys {
    /// Held while dragging vertically to scale one channel's amplitude.
    pub amplitude_scale: HotKey,
    /// Resets the amplitude of the channel under the pointer.
    pub amplitude_scale_single_reset: HotKey,
    /// Resets the amplitude of every channel.
    pub amplitude_scale_reset: HotKey,
}

impl Default for HotKeys {
    fn default() -> Self {
        Self {
            amplitude_scale: HotKey {
                key: Key::A,
                command: false,
                shift: false,
                alt: false,
            },
            amplitude_scale_single_reset: HotKey {
                key: Key::A,
                command: true,
                shift: false,
                alt: false,
            },
            amplitude_scale_reset: HotKey {
                key: Key::A,
                command: true,
                shift: true,
                alt: false,
            },
        }
    }
}
