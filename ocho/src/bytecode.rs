//! Helpers for extracting operand fields from a fetched instruction word.
//!
//! Instructions are 16-bit big-endian words. The high nibble selects the
//! opcode family; the remaining nibbles are operands, named per convention:
//!
//! ```text
//! 0xABCD
//!   A    op_code
//!    B   op_x
//!     C  op_y
//!      D op_n
//!     CD op_nn
//!    BCD op_nnn
//! ```

/// Extract the opcode family from an instruction word.
#[inline(always)]
pub fn op_code(word: u16) -> u8 {
    (word >> 12) as u8
}

/// Extract the VX register index.
#[inline(always)]
pub fn op_x(word: u16) -> u8 {
    ((word >> 8) & 0xF) as u8
}

/// Extract the VY register index.
#[inline(always)]
pub fn op_y(word: u16) -> u8 {
    ((word >> 4) & 0xF) as u8
}

/// Extract the low nibble operand.
#[inline(always)]
pub fn op_n(word: u16) -> u8 {
    (word & 0xF) as u8
}

/// Extract the low byte operand.
#[inline(always)]
pub fn op_nn(word: u16) -> u8 {
    (word & 0xFF) as u8
}

/// Extract the 12-bit address operand.
#[inline(always)]
pub fn op_nnn(word: u16) -> u16 {
    word & 0xFFF
}
