//! Edge-triggered keypad latch.
use crate::{constants::KEY_COUNT, devices::KeySet};

/// Tracks which of the 16 keys were *newly* pressed in the current
/// sampling interval.
///
/// Keys continuously held across samples are not re-reported. Most
/// programs poll in a tight loop and would otherwise see auto-repeat
/// artifacts they do not expect.
#[derive(Default)]
pub struct Keypad {
    /// Keys newly pressed this interval. Pressed is a 1 bit.
    latched: u16,
    /// Keys that were down at the previous sample.
    held: u16,
}

impl Keypad {
    pub fn new() -> Self {
        Default::default()
    }

    /// Refresh the latch from the set of keys currently down.
    pub fn sample(&mut self, down: KeySet) {
        self.latched = down.bits() & !self.held;
        self.held = down.bits();
    }

    /// Force a key into the latch, bypassing edge detection.
    pub fn press(&mut self, key_id: u8) {
        if key_id < KEY_COUNT {
            self.latched |= 1 << key_id;
        }
    }

    pub fn is_pressed(&self, key_id: u8) -> bool {
        key_id < KEY_COUNT && self.latched & (1 << key_id) != 0
    }

    /// Retrieve the lowest-numbered key in the latch.
    #[inline]
    pub fn first_pressed(&self) -> Option<u8> {
        if self.latched == 0 {
            None
        } else {
            Some(self.latched.trailing_zeros() as u8)
        }
    }

    pub fn clear(&mut self) {
        self.latched = 0;
        self.held = 0;
    }
}
