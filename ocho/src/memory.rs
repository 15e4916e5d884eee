//! Flat address space holding the builtin font and the loaded program.
use crate::{
    constants::*,
    error::{Chip8Error, Chip8Result},
};

/// 4096 bytes of machine memory.
///
/// The font glyphs are baked in at construction; the program region
/// starts at [`MEM_START`]. All access goes through bounds-checked
/// accessors, words are assembled big-endian.
pub struct Memory {
    ram: Box<[u8; MEM_SIZE]>,
    program_size: usize,
}

impl Default for Memory {
    fn default() -> Self {
        let mut ram = Box::new([0; MEM_SIZE]);
        ram[FONTSET_START..FONTSET_START + FONTSET.len()].copy_from_slice(&FONTSET);
        Self {
            ram,
            program_size: 0,
        }
    }
}

impl Memory {
    pub fn new() -> Self {
        Default::default()
    }

    /// Copy a ROM into the program region.
    ///
    /// All-or-nothing: when the ROM doesn't fit, memory is left untouched.
    pub fn load(&mut self, rom: &[u8]) -> Chip8Result<()> {
        if rom.len() > MEM_SIZE - MEM_START {
            return Err(Chip8Error::OutOfSpace {
                rom_size: rom.len(),
            });
        }

        // Start with a clean program region to avoid leaking a previous program.
        self.ram[MEM_START..].fill(0);
        self.ram[MEM_START..MEM_START + rom.len()].copy_from_slice(rom);
        self.program_size = rom.len();

        Ok(())
    }

    /// One past the address of the loaded program's last byte.
    pub fn program_end(&self) -> Address {
        (MEM_START + self.program_size) as Address
    }

    pub fn read_byte(&self, addr: Address) -> Chip8Result<u8> {
        self.ram
            .get(addr as usize)
            .copied()
            .ok_or(Chip8Error::OutOfBounds { addr })
    }

    pub fn write_byte(&mut self, addr: Address, value: u8) -> Chip8Result<()> {
        match self.ram.get_mut(addr as usize) {
            Some(byte) => {
                *byte = value;
                Ok(())
            }
            None => Err(Chip8Error::OutOfBounds { addr }),
        }
    }

    /// Read a 16-bit big-endian word, high byte at `addr`.
    pub fn read_word(&self, addr: Address) -> Chip8Result<u16> {
        let hi = self.read_byte(addr)?;
        let lo = self.read_byte(addr.wrapping_add(1))?;
        Ok(((hi as u16) << 8) | lo as u16)
    }
}
