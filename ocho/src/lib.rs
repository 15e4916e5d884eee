mod bytecode;
mod clock;
pub mod constants;
mod cpu;
mod devices;
mod disasm;
mod display;
mod error;
mod keypad;
mod memory;
mod rng;
mod vm;

pub use self::vm::Hz;

pub mod prelude {
    pub use super::{
        devices::{Devices, KeyCode, KeySet, NullDevices},
        disasm::Disassembler,
        display::FrameBuffer,
        error::{Chip8Error, Chip8Result},
        rng::Pcg32,
        vm::{Chip8Conf, Chip8Vm, Flow},
    };
}
