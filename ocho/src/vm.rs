//! Virtual machine.
use std::{fmt::Write as _, time::Duration};

use crate::{
    bytecode::*,
    clock::Clock,
    constants::*,
    cpu::Chip8Cpu,
    devices::{Devices, KeyCode, KeySet},
    display::FrameBuffer,
    error::{Chip8Error, Chip8Result},
    keypad::Keypad,
    memory::Memory,
    rng::Pcg32,
};

/// The whole machine: memory, registers, display, keypad and PRNG,
/// owned as one explicit value and driven by [`run`](Chip8Vm::run).
pub struct Chip8Vm {
    cpu: Chip8Cpu,
    memory: Memory,
    display: FrameBuffer,
    keypad: Keypad,
    rng: Pcg32,
    /// Instruction cadence. Unthrottled when no frequency is configured.
    clock: Clock,
    /// 60 Hz delay/sound timer decrement.
    timer: Clock,
    /// 60 Hz keyboard sampling.
    sampler: Clock,
    conf: Chip8Conf,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        Chip8Vm {
            cpu: Chip8Cpu::new(),
            memory: Memory::new(),
            display: FrameBuffer::new(),
            keypad: Keypad::new(),
            rng: Pcg32::default(),
            clock: Clock::new(conf.clock_frequency.unwrap_or_default().into()),
            timer: Clock::from_nanos(TIMER_INTERVAL),
            sampler: Clock::from_nanos(TIMER_INTERVAL),
            conf,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Load a ROM into program memory and reset execution state
    /// in preparation for a fresh startup.
    ///
    /// When the ROM does not fit, the machine is left untouched.
    pub fn load_rom(&mut self, rom: &[u8]) -> Chip8Result<()> {
        let mut memory = Memory::new();
        memory.load(rom)?;

        self.memory = memory;
        self.cpu = Chip8Cpu::new();
        self.display = FrameBuffer::new();
        self.keypad.clear();
        self.rng = Pcg32::default();
        self.reset_clocks();

        Ok(())
    }

    pub fn display_buffer(&self) -> &FrameBuffer {
        &self.display
    }

    pub fn sound_timer(&self) -> u8 {
        self.cpu.sound_timer
    }

    pub fn delay_timer(&self) -> u8 {
        self.cpu.delay_timer
    }

    /// Force a key into the input latch, bypassing the sampling interval.
    ///
    /// If the VM is stalled on a key-wait, the next step will resume it.
    pub fn set_key(&mut self, key: KeyCode) {
        self.keypad.press(key.as_u8());
    }

    /// Refresh the input latch from the set of keys currently down,
    /// as the scheduler does once per sampling interval.
    pub fn sample_keys(&mut self, down: KeySet) {
        self.keypad.sample(down);
    }

    /// Replace the PRNG stream consumed by the `RND` instruction.
    pub fn reseed(&mut self, state: u64, inc: u64) {
        self.rng = Pcg32::new(state, inc);
    }

    fn reset_clocks(&mut self) {
        self.clock.reset();
        self.timer.reset();
        self.sampler.reset();
    }
}

/// Outcome of a single dispatch step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 0nnn/1nnn (`SYS`/`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// The display buffer was mutated and is now dirty.
    Draw,
    /// Waiting for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`). The program
    /// counter was rolled back so the same instruction re-executes next
    /// cycle, keeping the scheduler responsive while stalled.
    KeyWait,
}

/// VM Configuration Parameters.
#[derive(Default, Clone)]
pub struct Chip8Conf {
    pub clock_frequency: Option<Hz>,
}

/// CPU clock frequency, in hertz (per second)
#[derive(Debug, Default, Clone, Copy)]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Scheduler
impl Chip8Vm {
    /// Drive the machine until the program counter passes the loaded
    /// program's last byte, the termination key is sampled, or an error
    /// surfaces from dispatch.
    ///
    /// Single-threaded and cooperative: one stream of execution
    /// interleaves dispatch with the two periodic triggers.
    pub fn run(&mut self, devices: &mut impl Devices) -> Chip8Result<()> {
        self.reset_clocks();

        while self.cpu.pc < self.memory.program_end() {
            self.clock.wait();

            // Count down timers at their own cadence, independent of dispatch.
            if self.timer.tick() {
                self.cpu.tick_delay();
                self.cpu.tick_sound();
            }

            // Refresh the input latch once per sampling interval.
            if self.sampler.tick() {
                match devices.poll_keys()? {
                    Some(down) => self.keypad.sample(down),
                    // Termination key ends the run regardless of the
                    // program counter.
                    None => break,
                }
            }

            self.step()?;

            if self.display.is_dirty() {
                devices.draw(&self.display)?;
                self.display.clear_dirty();
            }
        }

        Ok(())
    }

    /// Dispatch up to `step_count` instructions with timers and input
    /// left alone. Stops early when the program counter passes the end
    /// of the program.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;
        for _ in 0..step_count {
            if self.cpu.pc >= self.memory.program_end() {
                break;
            }
            flow = self.step()?;
        }
        Ok(flow)
    }
}

/// Interpreter
impl Chip8Vm {
    /// One fetch-decode-execute step.
    pub fn step(&mut self) -> Chip8Result<Flow> {
        let pc = self.cpu.pc;
        let word = self.memory.read_word(pc)?;

        // Advance before executing: every control transfer composes on
        // top of the already-advanced counter.
        self.cpu.pc = pc.wrapping_add(2);

        log::trace!("{pc:04X}: {word:04X}");

        let x = op_x(word) as usize;
        let y = op_y(word) as usize;

        let mut flow = Flow::Ok;

        match op_code(word) {
            0x0 => match word {
                // 00E0 (CLS)
                //
                // Clear display.
                0x00E0 => {
                    self.display.clear();
                    flow = Flow::Draw;
                }
                // 00EE (RET)
                //
                // Return from a subroutine.
                // Set the program counter to the value at the top of the stack.
                0x00EE => {
                    self.cpu.pc = self.cpu.pop()?;
                    flow = Flow::Jump;
                }
                // 0nnn (SYS addr)
                //
                // Legacy machine-code call; treated as a plain jump.
                _ => {
                    self.cpu.pc = op_nnn(word);
                    flow = Flow::Jump;
                }
            },
            // 1nnn (JP addr)
            //
            // Jump to address.
            0x1 => {
                self.cpu.pc = op_nnn(word);
                flow = Flow::Jump;
            }
            // 2nnn (CALL addr)
            //
            // Call subroutine at NNN. The pushed return address is the
            // advanced counter, so RET lands just after the call site.
            0x2 => {
                self.cpu.push(self.cpu.pc)?;
                self.cpu.pc = op_nnn(word);
                flow = Flow::Jump;
            }
            // 3xnn (SE Vx, byte)
            //
            // Skip the next instruction if register VX equals value NN.
            0x3 => {
                if self.cpu.registers[x] == op_nn(word) {
                    self.skip();
                }
            }
            // 4xnn (SNE Vx, byte)
            //
            // Skip the next instruction if register VX does not equal value NN.
            0x4 => {
                if self.cpu.registers[x] != op_nn(word) {
                    self.skip();
                }
            }
            // 5xy0 (SE Vx, Vy)
            //
            // Skip the next instruction if register VX equals VY.
            0x5 => {
                if op_n(word) != 0 {
                    return Err(invalid(word, pc));
                }
                if self.cpu.registers[x] == self.cpu.registers[y] {
                    self.skip();
                }
            }
            // 6xnn (LD Vx, byte)
            //
            // Set register VX to value NN.
            0x6 => {
                self.cpu.registers[x] = op_nn(word);
            }
            // 7xnn (ADD Vx, byte)
            //
            // Add value NN to register VX, wrapping. Carry flag is not set.
            0x7 => {
                let vx = self.cpu.registers[x];
                self.cpu.registers[x] = vx.wrapping_add(op_nn(word));
            }
            // Arithmetic instructions identified by n
            0x8 => self.exec_math(word, pc, x, y)?,
            // 9xy0 (SNE Vx, Vy)
            //
            // Skip the next instruction if register VX does not equal VY.
            0x9 => {
                if op_n(word) != 0 {
                    return Err(invalid(word, pc));
                }
                if self.cpu.registers[x] != self.cpu.registers[y] {
                    self.skip();
                }
            }
            // Annn (LD I, addr)
            //
            // Set address register I to value NNN.
            0xA => {
                self.cpu.address = op_nnn(word);
            }
            // Bnnn (JP V0, addr)
            //
            // Jump to address NNN offset by register V0.
            0xB => {
                self.cpu.pc = op_nnn(word).wrapping_add(self.cpu.registers[0] as u16);
                flow = Flow::Jump;
            }
            // Cxnn (RND Vx, byte)
            //
            // Set register VX to a random byte masked with NN.
            // Masking happens here, not inside the generator.
            0xC => {
                self.cpu.registers[x] = self.rng.next_byte() & op_nn(word);
            }
            // Dxyn (DRW Vx, Vy, nibble)
            //
            // Draw the 8xN sprite stored at address register I to the
            // display buffer at coordinates (VX, VY), wrapping at the
            // edges. VF is set to the collision flag.
            0xD => {
                let n = op_n(word) as usize;
                let addr = self.cpu.address;

                let mut sprite = [0_u8; 0xF];
                for (i, row) in sprite[..n].iter_mut().enumerate() {
                    *row = self.memory.read_byte(addr.wrapping_add(i as Address))?;
                }

                let x0 = self.cpu.registers[x];
                let y0 = self.cpu.registers[y];
                let collision = self.display.draw(x0, y0, &sprite[..n]);
                self.cpu.registers[0xF] = collision as u8;
                flow = Flow::Draw;
            }
            // Keyboard and miscellaneous instructions identified by nn
            0xE | 0xF => flow = self.exec_misc(word, pc, x)?,
            _ => return Err(invalid(word, pc)),
        }

        Ok(flow)
    }

    /// Skip over the next instruction.
    #[inline]
    fn skip(&mut self) {
        self.cpu.pc = self.cpu.pc.wrapping_add(2);
    }

    /// Execute an arithmetic instruction (family 8).
    ///
    /// Flag writes use the operand values captured before any mutation,
    /// and unconditionally overwrite VF.
    fn exec_math(&mut self, word: u16, pc: Address, x: usize, y: usize) -> Chip8Result<()> {
        let vx = self.cpu.registers[x];
        let vy = self.cpu.registers[y];

        match op_n(word) {
            // 8xy0 (LD Vx, Vy)
            0x0 => {
                self.cpu.registers[x] = vy;
            }
            // 8xy1 (OR Vx, Vy)
            0x1 => {
                self.cpu.registers[x] = vx | vy;
            }
            // 8xy2 (AND Vx, Vy)
            0x2 => {
                self.cpu.registers[x] = vx & vy;
            }
            // 8xy3 (XOR Vx, Vy)
            0x3 => {
                self.cpu.registers[x] = vx ^ vy;
            }
            // 8xy4 (ADD Vx, Vy)
            //
            // VF is the carry: 1 when the true sum exceeds 255.
            0x4 => {
                let (sum, carry) = vx.overflowing_add(vy);
                self.cpu.registers[0xF] = carry as u8;
                self.cpu.registers[x] = sum;
            }
            // 8xy5 (SUB Vx, Vy)
            //
            // VF is the no-borrow flag: 1 when VX >= VY before subtracting.
            0x5 => {
                self.cpu.registers[0xF] = (vx >= vy) as u8;
                self.cpu.registers[x] = vx.wrapping_sub(vy);
            }
            // 8xy6 (SHR Vx)
            //
            // VF is the bit shifted out, read before shifting. VY is unused.
            0x6 => {
                self.cpu.registers[0xF] = vx & 1;
                self.cpu.registers[x] = vx >> 1;
            }
            // 8xy7 (SUBN Vx, Vy)
            //
            // VF is the no-borrow flag: 1 when VY >= VX before subtracting.
            0x7 => {
                self.cpu.registers[0xF] = (vy >= vx) as u8;
                self.cpu.registers[x] = vy.wrapping_sub(vx);
            }
            // 8xyE (SHL Vx)
            //
            // VF is the top bit of VX, read before shifting. VY is unused.
            0xE => {
                self.cpu.registers[0xF] = (vx >> 7) & 1;
                self.cpu.registers[x] = vx << 1;
            }
            _ => return Err(invalid(word, pc)),
        }

        Ok(())
    }

    /// Execute a keyboard or miscellaneous instruction (families E and F).
    fn exec_misc(&mut self, word: u16, pc: Address, x: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;

        match (op_code(word), op_nn(word)) {
            // Ex9E (SKP Vx)
            //
            // Skip the next instruction if key VX is in the latch.
            (0xE, 0x9E) => {
                if self.keypad.is_pressed(self.cpu.registers[x]) {
                    self.skip();
                }
            }
            // ExA1 (SKNP Vx)
            //
            // Skip the next instruction if key VX is not in the latch.
            (0xE, 0xA1) => {
                if !self.keypad.is_pressed(self.cpu.registers[x]) {
                    self.skip();
                }
            }
            // Fx07 (LD Vx, DT)
            (0xF, 0x07) => {
                self.cpu.registers[x] = self.cpu.delay_timer;
            }
            // Fx0A (LD Vx, K)
            //
            // Block until a key is latched, then store the lowest-numbered
            // key in VX. Not a real block: the program counter is rewound
            // so the same instruction re-executes next cycle, and control
            // returns to the scheduler in between.
            (0xF, 0x0A) => match self.keypad.first_pressed() {
                Some(key_id) => {
                    self.cpu.registers[x] = key_id;
                }
                None => {
                    self.cpu.pc = pc;
                    flow = Flow::KeyWait;
                }
            },
            // Fx15 (LD DT, Vx)
            (0xF, 0x15) => {
                self.cpu.delay_timer = self.cpu.registers[x];
            }
            // Fx18 (LD ST, Vx)
            (0xF, 0x18) => {
                self.cpu.sound_timer = self.cpu.registers[x];
            }
            // Fx1E (ADD I, Vx)
            //
            // No overflow flag is defined for this addition.
            (0xF, 0x1E) => {
                let vx = self.cpu.registers[x];
                self.cpu.address = self.cpu.address.wrapping_add(vx as u16);
            }
            // Fx29 (LD F, Vx)
            //
            // Set I to the address of the font glyph for digit VX.
            (0xF, 0x29) => {
                let vx = self.cpu.registers[x] as usize;
                self.cpu.address = (FONTSET_START + FONTSET_HEIGHT * vx) as Address;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of VX
            // in the memory locations I, I+1, and I+2.
            #[rustfmt::skip]
            (0xF, 0x33) => {
                let addr = self.cpu.address;
                let vx = self.cpu.registers[x];
                self.memory.write_byte(addr,                 vx / 100 % 10)?;
                self.memory.write_byte(addr.wrapping_add(1), vx / 10  % 10)?;
                self.memory.write_byte(addr.wrapping_add(2), vx       % 10)?;
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            (0xF, 0x55) => {
                for i in 0..=x {
                    let addr = self.cpu.address.wrapping_add(i as Address);
                    self.memory.write_byte(addr, self.cpu.registers[i])?;
                }
            }
            // Fx65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            (0xF, 0x65) => {
                for i in 0..=x {
                    let addr = self.cpu.address.wrapping_add(i as Address);
                    self.cpu.registers[i] = self.memory.read_byte(addr)?;
                }
            }
            _ => return Err(invalid(word, pc)),
        }

        Ok(flow)
    }
}

#[inline]
fn invalid(word: u16, addr: Address) -> Chip8Error {
    Chip8Error::InvalidOpcode { word, addr }
}

/// Troubleshooting
impl Chip8Vm {
    /// Returns the contents of the display as a human readable string.
    pub fn dump_display(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();

        for row in self.display.rows() {
            for &px in row {
                write!(buf, "{}", if px { '#' } else { '.' })?;
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::devices::NullDevices;

    fn load(rom: &[u8]) -> Chip8Vm {
        let mut vm = Chip8Vm::new(Chip8Conf::default());
        vm.load_rom(rom).unwrap();
        vm
    }

    #[test]
    fn test_clock_hz() {
        let interval: Duration = Hz(60).into();
        assert_eq!(interval.as_millis(), 16);
    }

    #[test]
    fn test_rom_too_large() {
        let mut vm = Chip8Vm::new(Chip8Conf::default());
        let rom = vec![0; MEM_SIZE - MEM_START + 1];
        assert!(matches!(
            vm.load_rom(&rom),
            Err(Chip8Error::OutOfSpace { .. })
        ));
    }

    /// 2nnn and 00EE are inverse operations: SP and PC around the pair
    /// match, and the resumed PC is the call site plus 2.
    #[test]
    #[rustfmt::skip]
    fn test_call_and_return() {
        let mut vm = load(&[
            0x22, 0x06, // 0x200: CALL 0x206
            0x00, 0x00,
            0x00, 0x00,
            0x00, 0xEE, // 0x206: RET
        ]);

        assert_eq!(vm.step().unwrap(), Flow::Jump);
        assert_eq!(vm.cpu.pc, 0x206);
        assert_eq!(vm.cpu.sp, 1);
        assert_eq!(vm.cpu.stack[0], 0x202);

        assert_eq!(vm.step().unwrap(), Flow::Jump);
        assert_eq!(vm.cpu.pc, 0x202);
        assert_eq!(vm.cpu.sp, 0);
    }

    #[test]
    fn test_return_without_call() {
        let mut vm = load(&[0x00, 0xEE]);
        assert!(matches!(vm.step(), Err(Chip8Error::StackUnderflow)));
    }

    #[test]
    fn test_sys_is_a_jump() {
        let mut vm = load(&[0x05, 0x50]);
        assert_eq!(vm.step().unwrap(), Flow::Jump);
        assert_eq!(vm.cpu.pc, 0x550);
    }

    #[test]
    fn test_jump_with_offset() {
        let mut vm = load(&[
            0x60, 0x06, // LD V0, 6
            0xB2, 0x00, // JP V0, 0x200
        ]);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.pc, 0x206);
    }

    /// Skips advance PC by exactly 2 when not taken and 4 when taken.
    #[test]
    #[rustfmt::skip]
    fn test_skip_distances() {
        let mut vm = load(&[
            0x30, 0xFF, // SE V0, 0xFF  ; not taken
            0x30, 0x00, // SE V0, 0x00  ; taken
            0x00, 0x00,
            0x41, 0x00, // SNE V1, 0x00 ; not taken
            0x41, 0xFF, // SNE V1, 0xFF ; taken
            0x00, 0x00,
            0x50, 0x10, // SE V0, V1    ; taken
            0x00, 0x00,
            0x90, 0x10, // SNE V0, V1   ; not taken
        ]);

        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, 0x202);
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, 0x206);
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, 0x208);
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, 0x20C);
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, 0x210);
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, 0x212);
    }

    #[test]
    fn test_add_immediate_wraps() {
        let mut vm = load(&[
            0x60, 0xFF, // LD V0, 0xFF
            0x70, 0x01, // ADD V0, 1
        ]);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.registers[0], 0x00);
        // no carry flag for the immediate form
        assert_eq!(vm.cpu.registers[0xF], 0);
    }

    #[test]
    fn test_add_carry() {
        let mut vm = load(&[
            0x60, 0xFF, // LD V0, 0xFF
            0x61, 0x01, // LD V1, 1
            0x80, 0x14, // ADD V0, V1
        ]);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.cpu.registers[0], 0x00);
        assert_eq!(vm.cpu.registers[0xF], 1);

        let mut vm = load(&[
            0x60, 0x01, // LD V0, 1
            0x61, 0x01, // LD V1, 1
            0x80, 0x14, // ADD V0, V1
        ]);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.cpu.registers[0], 0x02);
        assert_eq!(vm.cpu.registers[0xF], 0);
    }

    #[test]
    fn test_sub_no_borrow_flag() {
        let mut vm = load(&[
            0x60, 0x05, // LD V0, 5
            0x61, 0x03, // LD V1, 3
            0x80, 0x15, // SUB V0, V1
        ]);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.cpu.registers[0], 0x02);
        assert_eq!(vm.cpu.registers[0xF], 1);

        let mut vm = load(&[
            0x60, 0x03, // LD V0, 3
            0x61, 0x05, // LD V1, 5
            0x80, 0x17, // SUBN V0, V1
        ]);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.cpu.registers[0], 0x02);
        assert_eq!(vm.cpu.registers[0xF], 1);

        let mut vm = load(&[
            0x60, 0x03, // LD V0, 3
            0x61, 0x05, // LD V1, 5
            0x80, 0x15, // SUB V0, V1
        ]);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.cpu.registers[0], 0xFE);
        assert_eq!(vm.cpu.registers[0xF], 0);
    }

    /// Shift flags derive from Vx's own bit, read before the shift.
    #[test]
    fn test_shift_flags() {
        let mut vm = load(&[
            0x60, 0x81, // LD V0, 0x81
            0x80, 0x06, // SHR V0
        ]);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.registers[0], 0x40);
        assert_eq!(vm.cpu.registers[0xF], 1);

        let mut vm = load(&[
            0x60, 0x81, // LD V0, 0x81
            0x80, 0x0E, // SHL V0
        ]);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.registers[0], 0x02);
        assert_eq!(vm.cpu.registers[0xF], 1);

        let mut vm = load(&[
            0x60, 0x7E, // LD V0, 0x7E
            0x80, 0x0E, // SHL V0
        ]);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.registers[0], 0xFC);
        assert_eq!(vm.cpu.registers[0xF], 0);
    }

    /// Cxnn draws from the deterministic PCG32 stream, masked at the
    /// call site.
    #[test]
    fn test_random_masked() {
        let mut vm = load(&[
            0xC0, 0xFF, // RND V0, 0xFF
            0xC1, 0x0F, // RND V1, 0x0F
        ]);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.registers[0], 0x8D);
        assert_eq!(vm.cpu.registers[1], 0x03 & 0x0F);
    }

    #[test]
    fn test_font_glyph_address() {
        let mut vm = load(&[
            0x60, 0x0F, // LD V0, 0xF
            0xF0, 0x29, // LD F, V0
        ]);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.address, 0x09B);
    }

    /// Drawing the glyph for digit F on an empty display reproduces its
    /// pixel pattern with no collision.
    #[test]
    fn test_draw_font_glyph() {
        let mut vm = load(&[
            0x60, 0x0F, // LD V0, 0xF
            0xF0, 0x29, // LD F, V0
            0x61, 0x00, // LD V1, 0
            0x62, 0x00, // LD V2, 0
            0xD1, 0x25, // DRW V1, V2, 5
        ]);
        assert_eq!(vm.run_steps(5).unwrap(), Flow::Draw);
        assert_eq!(vm.cpu.registers[0xF], 0);

        let dump = vm.dump_display().unwrap();
        let rows: Vec<&str> = dump.lines().map(|l| &l[..4]).collect();
        assert_eq!(rows[0], "####");
        assert_eq!(rows[1], "#...");
        assert_eq!(rows[2], "####");
        assert_eq!(rows[3], "#...");
        assert_eq!(rows[4], "#...");
        assert_eq!(rows[5], "....");
    }

    #[test]
    #[rustfmt::skip]
    fn test_draw_collision() {
        // Draw two sprites next to each other. The zero bits of the
        // second draw must not erase the pixels of the first.
        let mut vm = load(&[
            0xA2, 0x0C, // LD I, 0x20C
            0x60, 0x04, // LD V0, 4
            0x61, 0x00, // LD V1, 0
            0xD0, 0x11, // DRW V0, V1, 1
            0x60, 0x00, // LD V0, 0
            0xD0, 0x11, // DRW V0, V1, 1
            0xF0, 0x00, // sprite 0b11110000
        ]);
        vm.run_steps(6).unwrap();

        for x in 0..8 {
            assert!(vm.display.pixel(x, 0), "pixel ({x}, 0)");
        }
        assert_eq!(vm.cpu.registers[0xF], 0);

        // Drawing the same sprite again erases it and reports collision.
        let mut vm = load(&[
            0xA2, 0x06, // LD I, 0x206
            0xD0, 0x01, // DRW V0, V0, 1
            0xD0, 0x01, // DRW V0, V0, 1
            0xF0, 0x00,
        ]);
        vm.run_steps(3).unwrap();
        assert!(!vm.display.pixel(0, 0));
        assert_eq!(vm.cpu.registers[0xF], 1);
    }

    #[test]
    fn test_bcd() {
        let mut vm = load(&[
            0x60, 0xFE, // LD V0, 254
            0xA3, 0x00, // LD I, 0x300
            0xF0, 0x33, // LD B, V0
        ]);
        vm.run_steps(3).unwrap();
        assert_eq!(vm.memory.read_byte(0x300).unwrap(), 2);
        assert_eq!(vm.memory.read_byte(0x301).unwrap(), 5);
        assert_eq!(vm.memory.read_byte(0x302).unwrap(), 4);
    }

    /// Fx55/Fx65 move exactly registers V0..=Vx, leaving the rest alone.
    #[test]
    #[rustfmt::skip]
    fn test_store_and_load_registers() {
        let mut vm = load(&[
            0x60, 0x11, // LD V0, 0x11
            0x61, 0x22, // LD V1, 0x22
            0x62, 0x33, // LD V2, 0x33
            0x63, 0x44, // LD V3, 0x44
            0x64, 0x55, // LD V4, 0x55
            0xA3, 0x00, // LD I, 0x300
            0xF3, 0x55, // LD [I], V3
        ]);
        vm.run_steps(7).unwrap();

        for (i, expected) in [0x11, 0x22, 0x33, 0x44].into_iter().enumerate() {
            assert_eq!(vm.memory.read_byte(0x300 + i as Address).unwrap(), expected);
        }
        // V4 was not stored
        assert_eq!(vm.memory.read_byte(0x304).unwrap(), 0);

        let mut vm = load(&[
            0xA0, 0x50, // LD I, 0x050 ; font data as a source
            0xF3, 0x65, // LD V3, [I]
        ]);
        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.registers[..4], [0xF0, 0x90, 0x90, 0x90]);
        assert_eq!(vm.cpu.registers[4], 0, "V4 must be untouched");
    }

    #[test]
    fn test_delay_timer_roundtrip() {
        let mut vm = load(&[
            0x60, 0x09, // LD V0, 9
            0xF0, 0x15, // LD DT, V0
            0xF1, 0x07, // LD V1, DT
            0xF0, 0x18, // LD ST, V0
        ]);
        vm.run_steps(4).unwrap();
        assert_eq!(vm.cpu.registers[1], 9);
        assert_eq!(vm.sound_timer(), 9);
    }

    /// Fx0A (LD Vx, K)
    ///
    /// The VM must stall on the same instruction while the latch is
    /// empty, then resume with the lowest latched key in Vx.
    #[test]
    #[rustfmt::skip]
    fn test_key_wait() {
        let mut vm = load(&[
            0xF1, 0x0A, // LD V1, K
            0x62, 0x42, // LD V2, 0x42  ; sentinel
        ]);

        // machine must stall
        assert_eq!(vm.cpu.pc, 0x200);
        assert_eq!(vm.step().unwrap(), Flow::KeyWait);
        assert_eq!(vm.cpu.pc, 0x200);
        assert_eq!(vm.step().unwrap(), Flow::KeyWait);
        assert_eq!(vm.cpu.pc, 0x200);

        // a key lands in the latch
        vm.set_key(KeyCode::Key5);
        vm.set_key(KeyCode::Key9);

        // machine will now advance, taking the lowest key
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, 0x202);
        assert_eq!(vm.cpu.registers[1], 0x05);

        // ensure the machine is continuing
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, 0x204);
        assert_eq!(vm.cpu.registers[2], 0x42); // sentinel
    }

    #[test]
    fn test_skip_on_key() {
        let mut vm = load(&[
            0x60, 0x07, // LD V0, 7
            0xE0, 0x9E, // SKP V0
            0x00, 0x00,
            0xE0, 0xA1, // SKNP V0
        ]);
        vm.set_key(KeyCode::Key7);

        vm.run_steps(2).unwrap();
        assert_eq!(vm.cpu.pc, 0x206, "SKP must skip while key 7 is latched");
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, 0x208, "SKNP must not skip");
    }

    #[test]
    fn test_invalid_opcodes() {
        // 5xy0 with a nonzero low nibble
        let mut vm = load(&[0x50, 0x11]);
        assert!(matches!(
            vm.step(),
            Err(Chip8Error::InvalidOpcode { word: 0x5011, addr: 0x200 })
        ));

        // unknown F-family operation
        let mut vm = load(&[0xF0, 0xFF]);
        assert!(matches!(
            vm.step(),
            Err(Chip8Error::InvalidOpcode { word: 0xF0FF, .. })
        ));

        // unknown 8-family operation
        let mut vm = load(&[0x80, 0x18]);
        assert!(matches!(
            vm.step(),
            Err(Chip8Error::InvalidOpcode { word: 0x8018, .. })
        ));
    }

    /// The scheduler stops once the program counter passes the loaded
    /// program's last byte.
    #[test]
    fn test_run_stops_at_program_end() {
        let mut vm = load(&[0x60, 0x01]);
        vm.run(&mut NullDevices).unwrap();
        assert_eq!(vm.cpu.pc, 0x202);
        assert_eq!(vm.cpu.registers[0], 1);
    }

    /// The termination key ends the run regardless of the program counter.
    #[test]
    fn test_run_stops_on_termination_key() {
        struct Quit;

        impl Devices for Quit {
            fn poll_keys(&mut self) -> Chip8Result<Option<KeySet>> {
                Ok(None)
            }
            fn draw(&mut self, _display: &FrameBuffer) -> Chip8Result<()> {
                Ok(())
            }
        }

        // infinite loop
        let mut vm = load(&[0x12, 0x00]);
        vm.run(&mut Quit).unwrap();
        assert_eq!(vm.cpu.pc, 0x200);
    }
}
