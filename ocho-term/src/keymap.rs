//! Host keyboard to hexadecimal keypad mapping.
use std::error::Error;

use ocho::prelude::KeyCode;
use serde::Deserialize;

/// Maps host keyboard characters to the 16 keys of the hexadecimal
/// keypad, plus one character that terminates the machine.
///
/// `keys[i]` is the host character bound to keypad key `i`. Lookups are
/// case-insensitive.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    keys: [char; 16],
    quit: char,
}

impl Default for KeyBindings {
    /// The keypad's 4x4 layout folded onto the left half of a QWERTY
    /// keyboard:
    ///
    /// ```text
    /// 1 2 3 C        1 2 3 4
    /// 4 5 6 D   =>   q w e r
    /// 7 8 9 E        a s d f
    /// A 0 B F        z x c v
    /// ```
    fn default() -> Self {
        Self {
            keys: [
                'x', '1', '2', '3', 'q', 'w', 'e', 'a', 's', 'd', 'z', 'c', '4', 'r', 'f', 'v',
            ],
            quit: 'k',
        }
    }
}

impl KeyBindings {
    /// Load bindings from a YAML file. Missing fields fall back to the
    /// default layout.
    pub fn from_file(filepath: &str) -> Result<Self, Box<dyn Error>> {
        let file = std::fs::File::open(filepath)?;
        let bindings: KeyBindings = serde_yaml::from_reader(file)?;
        log::debug!("loaded key bindings: {bindings:?}");
        Ok(bindings)
    }

    /// Map a host character to its keypad key, if bound.
    pub fn lookup(&self, ch: char) -> Option<KeyCode> {
        let ch = ch.to_ascii_lowercase();
        self.keys
            .iter()
            .position(|&key| key == ch)
            .and_then(|index| KeyCode::try_from(index as u8).ok())
    }

    pub fn is_quit(&self, ch: char) -> bool {
        ch.to_ascii_lowercase() == self.quit
    }
}
