//! Disassembler.
use std::fmt::{self, Write as FmtWrite};

use crate::{bytecode::*, constants::MEM_START};

/// Formats raw bytecode one instruction per line, each prefixed with the
/// address the instruction occupies once loaded into program memory.
///
/// Words that decode to no instruction are printed as data, so sprite
/// bytes embedded in the program don't derail the listing.
pub struct Disassembler<'a> {
    bytecode: &'a [u8],
    cursor: usize,
}

impl<'a> Disassembler<'a> {
    pub fn new(bytecode: &'a [u8]) -> Self {
        Self {
            bytecode,
            cursor: 0,
        }
    }

    /// Write the whole program to the given writer.
    pub fn disassemble<W: FmtWrite>(&mut self, w: &mut W) -> fmt::Result {
        self.cursor = 0;

        while self.cursor + 1 < self.bytecode.len() {
            let word = u16::from_be_bytes([
                self.bytecode[self.cursor],
                self.bytecode[self.cursor + 1],
            ]);
            self.write_instruction(w, word)?;
            self.cursor += 2;
        }

        // a program with an odd byte count ends on a lone data byte
        if self.cursor < self.bytecode.len() {
            writeln!(w, "{:04X}: data {:02X}", self.addr(), self.bytecode[self.cursor])?;
        }

        Ok(())
    }

    /// Address the current word occupies in program memory.
    fn addr(&self) -> usize {
        MEM_START + self.cursor
    }

    fn write_instruction<W: FmtWrite>(&self, w: &mut W, word: u16) -> fmt::Result {
        match op_code(word) {
            0x0 => match word {
                0x00E0 => self.dis_simple(w, "Clear Screen"),
                0x00EE => self.dis_simple(w, "Return"),
                _ => self.dis_nnn(w, word, "Sys Jump"),
            },
            0x1 => self.dis_nnn(w, word, "Jump"),
            0x2 => self.dis_nnn(w, word, "Call"),
            0x3 => self.dis_xnn(w, word, "Skip Equal"),
            0x4 => self.dis_xnn(w, word, "Skip Not-equal"),
            0x5 if op_n(word) == 0 => self.dis_xy(w, word, "Skip Equal"),
            0x6 => self.dis_xnn(w, word, "Load"),
            0x7 => self.dis_xnn(w, word, "Add"),
            0x8 => match op_n(word) {
                0x0 => self.dis_xy(w, word, "Load"),
                0x1 => self.dis_xy(w, word, "OR"),
                0x2 => self.dis_xy(w, word, "AND"),
                0x3 => self.dis_xy(w, word, "XOR"),
                0x4 => self.dis_xy(w, word, "Add"),
                0x5 => self.dis_xy(w, word, "Subtract"),
                0x6 => self.dis_x(w, word, "Shift Right"),
                0x7 => self.dis_xy(w, word, "Subtract Negated"),
                0xE => self.dis_x(w, word, "Shift Left"),
                _ => self.dis_data(w, word),
            },
            0x9 if op_n(word) == 0 => self.dis_xy(w, word, "Skip Not-equal"),
            0xA => self.dis_nnn(w, word, "Load I"),
            0xB => self.dis_nnn(w, word, "Jump V0"),
            0xC => self.dis_xnn(w, word, "Random"),
            0xD => self.dis_xyn(w, word, "Draw"),
            0xE => match op_nn(word) {
                0x9E => self.dis_x(w, word, "Skip Key"),
                0xA1 => self.dis_x(w, word, "Skip Not-key"),
                _ => self.dis_data(w, word),
            },
            0xF => match op_nn(word) {
                0x07 => self.dis_x(w, word, "Load Delay"),
                0x0A => self.dis_x(w, word, "Wait Key"),
                0x15 => self.dis_x(w, word, "Set Delay"),
                0x18 => self.dis_x(w, word, "Set Sound"),
                0x1E => self.dis_x(w, word, "Add I"),
                0x29 => self.dis_x(w, word, "Load Glyph"),
                0x33 => self.dis_x(w, word, "Store BCD"),
                0x55 => self.dis_x(w, word, "Store Registers"),
                0x65 => self.dis_x(w, word, "Load Registers"),
                _ => self.dis_data(w, word),
            },
            _ => self.dis_data(w, word),
        }
    }

    fn dis_simple<W: FmtWrite>(&self, w: &mut W, name: &str) -> fmt::Result {
        writeln!(w, "{:04X}: {}", self.addr(), name)
    }

    fn dis_nnn<W: FmtWrite>(&self, w: &mut W, word: u16, name: &str) -> fmt::Result {
        writeln!(w, "{:04X}: {} {:03X}", self.addr(), name, op_nnn(word))
    }

    fn dis_xnn<W: FmtWrite>(&self, w: &mut W, word: u16, name: &str) -> fmt::Result {
        let (vx, nn) = (op_x(word), op_nn(word));
        writeln!(w, "{:04X}: {} V{:02X} {:02X}", self.addr(), name, vx, nn)
    }

    fn dis_xy<W: FmtWrite>(&self, w: &mut W, word: u16, name: &str) -> fmt::Result {
        let (vx, vy) = (op_x(word), op_y(word));
        writeln!(w, "{:04X}: {} V{:02X} V{:02X}", self.addr(), name, vx, vy)
    }

    fn dis_x<W: FmtWrite>(&self, w: &mut W, word: u16, name: &str) -> fmt::Result {
        writeln!(w, "{:04X}: {} V{:02X}", self.addr(), name, op_x(word))
    }

    fn dis_xyn<W: FmtWrite>(&self, w: &mut W, word: u16, name: &str) -> fmt::Result {
        let (vx, vy, n) = (op_x(word), op_y(word), op_n(word));
        writeln!(
            w,
            "{:04X}: {} V{:02X} V{:02X} {:X}",
            self.addr(),
            name,
            vx,
            vy,
            n
        )
    }

    fn dis_data<W: FmtWrite>(&self, w: &mut W, word: u16) -> fmt::Result {
        writeln!(w, "{:04X}: data {:04X}", self.addr(), word)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn listing(bytecode: &[u8]) -> Vec<String> {
        let mut disasm = Disassembler::new(bytecode);
        let mut buf = String::new();
        disasm.disassemble(&mut buf).unwrap();
        buf.lines().map(str::to_owned).collect()
    }

    #[test]
    fn test_addresses_are_load_offsets() {
        let lines = listing(&[0x00, 0xE0, 0x12, 0x00]);
        assert_eq!(lines, ["0200: Clear Screen", "0202: Jump 200"]);
    }

    #[test]
    fn test_arithmetic_family() {
        let lines = listing(&[
            0x8A, 0xB4, // ADD VA, VB
            0x8A, 0xB6, // SHR VA
            0x8A, 0xB8, // no such instruction
        ]);
        assert_eq!(lines[0], "0200: Add V0A V0B");
        assert_eq!(lines[1], "0202: Shift Right V0A");
        assert_eq!(lines[2], "0204: data 8AB8");
    }

    #[test]
    fn test_trailing_byte_is_data() {
        let lines = listing(&[0xD0, 0x15, 0xF0]);
        assert_eq!(lines, ["0200: Draw V00 V01 5", "0202: data F0"]);
    }
}
