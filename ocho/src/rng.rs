//! PCG32 random number generator (XSH-RR output variant).
use rand::{Error, RngCore};

/// Default seed state. Gives a reproducible stream unless reseeded.
pub const PCG_DEFAULT_STATE: u64 = 0x853c_49e6_748f_ea9b;
pub const PCG_DEFAULT_INCREMENT: u64 = 0xda3e_39cb_94b9_5bdb;

const PCG_MULTIPLIER: u64 = 6_364_136_223_846_793_005;

/// Deterministic generator backing the `RND` instruction.
///
/// One 64-bit state word advanced by a linear congruential step; the output
/// permutation (xorshift-high followed by a random rotate) is applied to the
/// state *before* the step.
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Default for Pcg32 {
    fn default() -> Self {
        Self::new(PCG_DEFAULT_STATE, PCG_DEFAULT_INCREMENT)
    }
}

impl Pcg32 {
    pub fn new(state: u64, inc: u64) -> Self {
        Self { state, inc }
    }

    /// Low 8 bits of the next 32-bit output. The `RND` opcode masks this
    /// with its immediate operand at the call site.
    #[inline]
    pub fn next_byte(&mut self) -> u8 {
        (self.next_u32() & 0xFF) as u8
    }
}

impl RngCore for Pcg32 {
    fn next_u32(&mut self) -> u32 {
        let oldstate = self.state;
        self.state = oldstate
            .wrapping_mul(PCG_MULTIPLIER)
            .wrapping_add(self.inc | 1);
        let xorshifted = (((oldstate >> 18) ^ oldstate) >> 27) as u32;
        let rot = (oldstate >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    fn next_u64(&mut self) -> u64 {
        ((self.next_u32() as u64) << 32) | self.next_u32() as u64
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
