//! Result and errors.
use std::fmt::{self, Display, Formatter};
use std::io;

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

/// Fatal machine conditions. None of these are recoverable;
/// the scheduler halts and surfaces them to its caller.
#[derive(Debug)]
pub enum Chip8Error {
    /// Attempt to load a ROM that can't fit in program memory.
    /// Nothing is written when this occurs.
    OutOfSpace { rom_size: usize },
    /// Memory access outside the 4096 byte address space.
    OutOfBounds { addr: u16 },
    /// Call nested deeper than the stack allows.
    StackOverflow,
    /// Return without a matching call.
    StackUnderflow,
    /// A fetched word matched no known instruction.
    InvalidOpcode { word: u16, addr: u16 },
    Io(io::Error),
    Fmt(fmt::Error),
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfSpace { rom_size } => {
                write!(f, "ROM of {} bytes too large for program memory", rom_size)
            }
            Self::OutOfBounds { addr } => {
                write!(f, "memory access out of bounds: {:#06X}", addr)
            }
            Self::StackOverflow => write!(f, "call stack overflow"),
            Self::StackUnderflow => write!(f, "call stack underflow"),
            Self::InvalidOpcode { word, addr } => {
                write!(f, "invalid opcode {:04X} at {:#06X}", word, addr)
            }
            Self::Io(err) => write!(f, "{}", err),
            Self::Fmt(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Chip8Error {}

impl From<io::Error> for Chip8Error {
    fn from(err: io::Error) -> Self {
        Chip8Error::Io(err)
    }
}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}
