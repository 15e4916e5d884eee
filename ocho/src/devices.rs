//! IO device interface
use crate::{constants::KEY_COUNT, display::FrameBuffer, error::Chip8Result};

/// Hooks to provide IO devices to the virtual machine.
///
/// The scheduler is the only caller. It polls the keyboard once per
/// sampling interval and blits the display only when the buffer is dirty;
/// implementations never mutate machine state.
pub trait Devices {
    /// Sample the set of keys currently held down.
    ///
    /// Returns `None` when the user pressed the termination key,
    /// which ends the scheduler loop immediately.
    fn poll_keys(&mut self) -> Chip8Result<Option<KeySet>>;

    /// Blit the display buffer to screen output.
    fn draw(&mut self, display: &FrameBuffer) -> Chip8Result<()>;
}

/// Device implementation that reads no keys and draws nowhere.
/// Useful for tests and benchmarks.
#[derive(Default)]
pub struct NullDevices;

impl Devices for NullDevices {
    fn poll_keys(&mut self) -> Chip8Result<Option<KeySet>> {
        Ok(Some(KeySet::new()))
    }

    fn draw(&mut self, _display: &FrameBuffer) -> Chip8Result<()> {
        Ok(())
    }
}

/// Set of keys held down at one sampling instant, one bit per key.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeySet(u16);

impl KeySet {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, key: KeyCode) {
        self.0 |= 1 << key.as_u8();
    }

    pub fn contains(&self, key: KeyCode) -> bool {
        self.0 & (1 << key.as_u8()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        match key_id {
            0 => Ok(Self::Key0),
            1 => Ok(Self::Key1),
            2 => Ok(Self::Key2),
            3 => Ok(Self::Key3),
            4 => Ok(Self::Key4),
            5 => Ok(Self::Key5),
            6 => Ok(Self::Key6),
            7 => Ok(Self::Key7),
            8 => Ok(Self::Key8),
            9 => Ok(Self::Key9),
            10 => Ok(Self::KeyA),
            11 => Ok(Self::KeyB),
            12 => Ok(Self::KeyC),
            13 => Ok(Self::KeyD),
            14 => Ok(Self::KeyE),
            15 => Ok(Self::KeyF),
            _ => Err(InvalidKeyCode),
        }
    }
}

#[derive(Debug)]
pub struct InvalidKeyCode;

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < {KEY_COUNT}")
    }
}
