// Copyright 2018 Ian Johnson

// This file is part of Chip-8 Harness.

// Chip-8 Harness is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Chip-8 Harness is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Chip-8 Harness.  If not, see <http://www.gnu.org/licenses/>.

//! The bundled Chip-8 interpreter.
//!
//! `Interpreter` holds the whole machine state and implements `Emulator`, so a
//! session can drive it directly.  The two compatibility variants differ in
//! three places: the shift instructions (`8XY6`/`8XYE`), the register
//! load/store instructions (`FX55`/`FX65`) and the offset jump (`BNNN`).
//! `Original` follows the COSMAC VIP, `Modern` follows the later
//! interpreters.

use std::default::Default;

use failure::{Error, ResultExt};
use rand;

use display::{self, Surface, HEX_HEIGHT, HEX_SPRITES};
use emulator::{Backend, Emulator, NotInitializedError, Variant};
use input::{self, Keymap};
use timer::Timer;
use FONT_START;
use MEM_SIZE;
use PROG_SIZE;
use PROG_START;
use STACK_SIZE;

/// An error resulting from a bad `RET` instruction.
#[derive(Debug, Fail)]
#[fail(display = "no subroutine to return from")]
pub struct NotInSubroutineError;

/// An error resulting from calling too many nested subroutines.
#[derive(Debug, Fail)]
#[fail(display = "call stack overflowed")]
pub struct StackOverflowError;

/// An error resulting from an input program being too large.
#[derive(Debug, Fail)]
#[fail(display = "input program is too large")]
pub struct ProgramTooLargeError;

/// An error resulting from an empty input program.
#[derive(Debug, Fail)]
#[fail(display = "input program is empty")]
pub struct EmptyProgramError;

/// An error resulting from an opcode that is not an instruction.
#[derive(Debug, Fail)]
#[fail(display = "unknown opcode {:04X}", _0)]
pub struct UnknownOpcodeError(pub u16);

/// An error resulting from an attempt to access memory past its end.
#[derive(Debug, Fail)]
#[fail(display = "address {:#05X} is out of bounds", _0)]
pub struct AddressOutOfBoundsError(pub usize);

/// Options for the interpreter.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// The compatibility variant (default `Original`).
    pub variant: Variant,
    /// Whether to run the delay and sound timers (default `true`).
    pub enable_timer: bool,
    /// The frequency of the delay and sound timers, in Hz (default 60).
    pub timer_freq: u32,
}

impl Options {
    /// Returns the default set of options.
    pub fn new() -> Self {
        Options {
            variant: Variant::Original,
            enable_timer: true,
            timer_freq: 60,
        }
    }

    /// Returns a set of options useful for testing (e.g. no timer).
    pub fn testing() -> Self {
        Options {
            enable_timer: false,
            ..Options::new()
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::new()
    }
}

/// A Chip-8 interpreter presenting its display on a surface of type `S`.
pub struct Interpreter<S> {
    /// The internal memory.
    mem: [u8; MEM_SIZE],
    /// The display buffer.
    display: display::Buffer,
    /// The keypad state.
    input: input::State,
    /// The keyboard layout used by `key_down`.
    keymap: Keymap,
    /// The general-purpose registers `V0`-`VF`.
    regs: [u8; 16],
    /// The special register `I`.
    reg_i: u16,
    /// The internal timer that drives `DT` and `ST`.
    timer: Timer,
    /// The delay timer.
    reg_dt: u8,
    /// The sound timer.
    reg_st: u8,
    /// The program counter.
    pc: u16,
    /// The call stack (for returning from subroutines).
    call_stack: Vec<u16>,

    variant: Variant,
    surface: S,
}

impl<S: Surface> Interpreter<S> {
    /// Returns a new interpreter with the default options.
    pub fn new(surface: S) -> Self {
        Interpreter::with_options(Options::default(), surface)
    }

    /// Returns a new interpreter using the given options.
    pub fn with_options(options: Options, surface: S) -> Self {
        let mut interpreter = Interpreter {
            mem: [0; MEM_SIZE],
            display: display::Buffer::new(),
            input: input::State::new(),
            keymap: Keymap::new(),
            regs: [0; 16],
            reg_i: 0,
            timer: if options.enable_timer {
                Timer::new(options.timer_freq)
            } else {
                Timer::new_disabled(options.timer_freq)
            },
            reg_dt: 0,
            reg_st: 0,
            pc: PROG_START as u16,
            call_stack: Vec::with_capacity(STACK_SIZE),

            variant: options.variant,
            surface,
        };

        for (i, sprite) in HEX_SPRITES.iter().enumerate() {
            let start = FONT_START + i * HEX_HEIGHT;
            interpreter.mem[start..start + HEX_HEIGHT].copy_from_slice(sprite);
        }

        interpreter
    }

    /// Replaces the loaded program, resetting the machine.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), Error> {
        if program.is_empty() {
            return Err(EmptyProgramError.into());
        }
        if program.len() > PROG_SIZE {
            return Err(ProgramTooLargeError.into());
        }

        for byte in self.mem[PROG_START..].iter_mut() {
            *byte = 0;
        }
        self.mem[PROG_START..PROG_START + program.len()].copy_from_slice(program);
        self.regs = [0; 16];
        self.reg_i = 0;
        self.reg_dt = 0;
        self.reg_st = 0;
        self.pc = PROG_START as u16;
        self.call_stack.clear();
        self.display.clear();
        self.input.release_all();
        debug!("loaded program of {} bytes", program.len());
        Ok(())
    }

    /// Returns a reference to the display buffer.
    pub fn display(&self) -> &display::Buffer {
        &self.display
    }

    /// Returns a reference to the keypad state.
    pub fn input(&self) -> &input::State {
        &self.input
    }

    /// Returns a mutable reference to the keypad state.
    pub fn input_mut(&mut self) -> &mut input::State {
        &mut self.input
    }

    /// Returns a reference to the internal memory.
    pub fn mem(&self) -> &[u8; MEM_SIZE] {
        &self.mem
    }

    /// Returns a reference to the surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Returns the compatibility variant.
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Returns the value of register `I`.
    pub fn i(&self) -> u16 {
        self.reg_i
    }

    /// Sets the value of register `I`.
    pub fn set_i(&mut self, val: u16) {
        self.reg_i = val;
    }

    /// Returns the value of the delay timer.
    pub fn dt(&self) -> u8 {
        self.reg_dt
    }

    /// Returns the value of the sound timer.
    pub fn st(&self) -> u8 {
        self.reg_st
    }

    /// Returns the value of register `Vx`.
    pub fn register(&self, x: usize) -> u8 {
        self.regs[x]
    }

    /// Sets register `Vx` to the given value.
    pub fn set_register(&mut self, x: usize, val: u8) {
        self.regs[x] = val;
    }

    /// Returns the value of the program counter.
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Returns the opcode at the program counter.
    pub fn current_opcode(&self) -> Result<u16, AddressOutOfBoundsError> {
        let pc = self.pc as usize;
        if pc + 1 >= MEM_SIZE {
            return Err(AddressOutOfBoundsError(pc + 1));
        }
        Ok((self.mem[pc] as u16) << 8 | self.mem[pc + 1] as u16)
    }

    /// Performs a single execution step.
    pub fn step(&mut self) -> Result<(), Error> {
        self.update_timers();
        let pc = self.pc;
        let opcode = self.current_opcode()?;
        self.pc += 2;
        self.execute(opcode)
            .with_context(|_| format!("error executing {:04X} at {:#05X}", opcode, pc))?;
        Ok(())
    }

    /// Executes the given opcode.
    ///
    /// The program counter is expected to already point past the opcode.
    pub fn execute(&mut self, opcode: u16) -> Result<(), Error> {
        let x = (opcode >> 8 & 0xF) as usize;
        let y = (opcode >> 4 & 0xF) as usize;
        let n = (opcode & 0xF) as u8;
        let nn = (opcode & 0xFF) as u8;
        let nnn = opcode & 0xFFF;

        match opcode >> 12 {
            0x0 => match opcode {
                0x00E0 => self.display.clear(),
                0x00EE => self.pc = self.call_stack.pop().ok_or(NotInSubroutineError)?,
                _ => trace!("ignoring machine code routine at {:#05X}", nnn),
            },
            0x1 => self.pc = nnn,
            0x2 => {
                if self.call_stack.len() >= STACK_SIZE {
                    return Err(StackOverflowError.into());
                }
                self.call_stack.push(self.pc);
                self.pc = nnn;
            }
            0x3 => if self.regs[x] == nn {
                self.skip();
            },
            0x4 => if self.regs[x] != nn {
                self.skip();
            },
            0x5 if n == 0 => if self.regs[x] == self.regs[y] {
                self.skip();
            },
            0x6 => self.regs[x] = nn,
            0x7 => self.regs[x] = self.regs[x].wrapping_add(nn),
            0x8 => self.alu(opcode, x, y, n)?,
            0x9 if n == 0 => if self.regs[x] != self.regs[y] {
                self.skip();
            },
            0xA => self.reg_i = nnn,
            0xB => {
                self.pc = match self.variant {
                    Variant::Original => nnn + self.regs[0] as u16,
                    Variant::Modern => nnn + self.regs[x] as u16,
                }
            }
            0xC => self.regs[x] = rand::random::<u8>() & nn,
            0xD => self.drw(x, y, n)?,
            0xE => match nn {
                0x9E => if self.input.is_pressed(input::Key::from_byte(self.regs[x])) {
                    self.skip();
                },
                0xA1 => if !self.input.is_pressed(input::Key::from_byte(self.regs[x])) {
                    self.skip();
                },
                _ => return Err(UnknownOpcodeError(opcode).into()),
            },
            0xF => self.misc(opcode, x, nn)?,
            _ => return Err(UnknownOpcodeError(opcode).into()),
        }

        Ok(())
    }

    fn skip(&mut self) {
        self.pc += 2;
    }

    /// Implements the `8XYN` arithmetic and logic operations.
    fn alu(&mut self, opcode: u16, x: usize, y: usize, n: u8) -> Result<(), Error> {
        match n {
            0x0 => self.regs[x] = self.regs[y],
            0x1 => self.regs[x] |= self.regs[y],
            0x2 => self.regs[x] &= self.regs[y],
            0x3 => self.regs[x] ^= self.regs[y],
            0x4 => {
                let (sum, carry) = self.regs[x].overflowing_add(self.regs[y]);
                self.regs[x] = sum;
                self.regs[0xF] = carry as u8;
            }
            0x5 => {
                let (diff, borrow) = self.regs[x].overflowing_sub(self.regs[y]);
                self.regs[x] = diff;
                self.regs[0xF] = !borrow as u8;
            }
            0x6 => {
                if self.variant == Variant::Original {
                    self.regs[x] = self.regs[y];
                }
                let old = self.regs[x] & 1;
                self.regs[x] >>= 1;
                self.regs[0xF] = old;
            }
            0x7 => {
                let (diff, borrow) = self.regs[y].overflowing_sub(self.regs[x]);
                self.regs[x] = diff;
                self.regs[0xF] = !borrow as u8;
            }
            0xE => {
                if self.variant == Variant::Original {
                    self.regs[x] = self.regs[y];
                }
                let old = self.regs[x] >> 7;
                self.regs[x] <<= 1;
                self.regs[0xF] = old;
            }
            _ => return Err(UnknownOpcodeError(opcode).into()),
        }
        Ok(())
    }

    /// Implements the `FXNN` timer, keypad and memory operations.
    fn misc(&mut self, opcode: u16, x: usize, nn: u8) -> Result<(), Error> {
        match nn {
            0x07 => self.regs[x] = self.reg_dt,
            0x0A => match self.input.get_pressed() {
                Some(key) => self.regs[x] = key as u8,
                // Wait by running this instruction again.
                None => self.pc -= 2,
            },
            0x15 => self.reg_dt = self.regs[x],
            0x18 => self.reg_st = self.regs[x],
            0x1E => {
                self.reg_i = self.reg_i.wrapping_add(self.regs[x] as u16);
                if self.reg_i > 0xFFF {
                    self.regs[0xF] = 1;
                }
            }
            0x29 => {
                self.reg_i = (FONT_START + HEX_HEIGHT * (self.regs[x] & 0xF) as usize) as u16
            }
            0x33 => {
                let val = self.regs[x];
                let addr = self.memory_range(3)?;
                self.mem[addr] = val / 100;
                self.mem[addr + 1] = val % 100 / 10;
                self.mem[addr + 2] = val % 10;
            }
            0x55 => {
                let start = self.memory_range(x + 1)?;
                self.mem[start..start + x + 1].copy_from_slice(&self.regs[..x + 1]);
                if self.variant == Variant::Original {
                    self.reg_i = self.reg_i.wrapping_add(x as u16 + 1);
                }
            }
            0x65 => {
                let start = self.memory_range(x + 1)?;
                self.regs[..x + 1].copy_from_slice(&self.mem[start..start + x + 1]);
                if self.variant == Variant::Original {
                    self.reg_i = self.reg_i.wrapping_add(x as u16 + 1);
                }
            }
            _ => return Err(UnknownOpcodeError(opcode).into()),
        }
        Ok(())
    }

    /// Implements the `DXYN` operation.
    fn drw(&mut self, x: usize, y: usize, n: u8) -> Result<(), Error> {
        let start = self.memory_range(n as usize)?;
        let px = self.regs[x] as usize;
        let py = self.regs[y] as usize;
        let collision = self.display
            .draw_sprite(&self.mem[start..start + n as usize], px, py);
        self.regs[0xF] = collision as u8;
        Ok(())
    }

    /// Returns `I` as an address, checking that `len` bytes starting there
    /// are in memory.
    fn memory_range(&self, len: usize) -> Result<usize, AddressOutOfBoundsError> {
        let start = self.reg_i as usize;
        if start + len > MEM_SIZE {
            Err(AddressOutOfBoundsError(start + len - 1))
        } else {
            Ok(start)
        }
    }

    /// Counts down the `DT` and `ST` registers.
    fn update_timers(&mut self) {
        let ticks = self.timer.lap();
        let ticks = if ticks > 0xFF { 0xFF } else { ticks as u8 };
        self.reg_dt = self.reg_dt.saturating_sub(ticks);
        self.reg_st = self.reg_st.saturating_sub(ticks);
    }
}

impl<S: Surface> Emulator for Interpreter<S> {
    fn load_rom(&mut self, rom: &[u8]) -> Result<(), Error> {
        self.load_program(rom)
    }

    fn cycle(&mut self) -> Result<(), Error> {
        self.step()
    }

    fn draw(&mut self) -> Result<(), Error> {
        let surface = &mut self.surface;
        self.display
            .refresh(|buffer| surface.present(buffer))
            .context("could not present display")?;
        Ok(())
    }

    fn key_down(&mut self, code: &str) {
        match self.keymap.get(code) {
            Some(key) => self.input.press(key),
            None => trace!("ignoring unmapped key {}", code),
        }
    }

    fn key_up(&mut self) {
        self.input.release_all();
    }
}

/// Creates interpreters that all present on clones of one surface.
pub struct Chip8Backend<S> {
    surface: S,
    options: Options,
    initialized: bool,
}

impl<S: Surface + Clone> Chip8Backend<S> {
    /// Returns a backend whose instances present on `surface`.
    pub fn new(surface: S) -> Self {
        Chip8Backend::with_options(Options::default(), surface)
    }

    /// Returns a backend whose instances use the given options (except for
    /// the variant, which is chosen per instance).
    pub fn with_options(options: Options, surface: S) -> Self {
        Chip8Backend {
            surface,
            options,
            initialized: false,
        }
    }
}

impl<S: Surface + Clone> Backend for Chip8Backend<S> {
    type Instance = Interpreter<S>;

    fn init(&mut self) -> Result<(), Error> {
        if self.initialized {
            debug!("backend already initialized");
        } else {
            info!("initializing Chip-8 backend");
            self.initialized = true;
        }
        Ok(())
    }

    fn create(&mut self, variant: Variant) -> Result<Interpreter<S>, Error> {
        if !self.initialized {
            return Err(NotInitializedError.into());
        }
        debug!("creating {:?} interpreter", variant);
        let options = Options {
            variant,
            ..self.options
        };
        Ok(Interpreter::with_options(options, self.surface.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use display::NullSurface;
    use emulator::{Backend, Emulator, Variant};
    use input::Key;
    use interpreter::{Chip8Backend, Interpreter, Options};
    use FONT_START;
    use PROG_SIZE;
    use PROG_START;

    fn interpreter(variant: Variant) -> Interpreter<NullSurface> {
        Interpreter::with_options(
            Options {
                variant,
                ..Options::testing()
            },
            NullSurface::new(),
        )
    }

    /// Tests `8XY4`.
    #[test]
    fn instruction_add() {
        // Test cases, in the format (x, y, b1, b2).
        let cases = [
            (0, 1, 24u8, 67u8),
            (5, 0xD, 54u8, 102u8),
            (7, 0xE, 255u8, 255u8),
            (2, 4, 1u8, 255u8),
            (5, 6, 0u8, 78u8),
        ];
        let mut interpreter = interpreter(Variant::Original);

        for &(x, y, b1, b2) in cases.iter() {
            let case = (x, y, b1, b2);
            let (sum, carry) = b1.overflowing_add(b2);

            interpreter.set_register(x, b1);
            interpreter.set_register(y, b2);
            interpreter
                .execute(0x8004 | (x as u16) << 8 | (y as u16) << 4)
                .unwrap();
            assert_eq!(interpreter.register(x), sum, "case {:?}", case);
            assert_eq!(interpreter.register(0xF), carry as u8, "case {:?}", case);
        }
    }

    /// Tests `8XY5` and `8XY7`.
    #[test]
    fn instruction_sub() {
        let cases = [
            (9, 8, 70u8, 35u8),
            (6, 2, 56u8, 2u8),
            (0, 1, 0u8, 0u8),
            (3, 7, 1u8, 255u8),
        ];
        let mut interpreter = interpreter(Variant::Original);

        for &(x, y, b1, b2) in cases.iter() {
            let case = (x, y, b1, b2);
            let op = 0x8000 | (x as u16) << 8 | (y as u16) << 4;

            interpreter.set_register(x, b1);
            interpreter.set_register(y, b2);
            interpreter.execute(op | 0x5).unwrap();
            assert_eq!(interpreter.register(x), b1.wrapping_sub(b2), "case {:?}", case);
            assert_eq!(interpreter.register(0xF), (b1 >= b2) as u8, "case {:?}", case);

            interpreter.set_register(x, b1);
            interpreter.set_register(y, b2);
            interpreter.execute(op | 0x7).unwrap();
            assert_eq!(interpreter.register(x), b2.wrapping_sub(b1), "case {:?}", case);
            assert_eq!(interpreter.register(0xF), (b2 >= b1) as u8, "case {:?}", case);
        }
    }

    /// `8XY6` and `8XYE` copy `VY` first only in the original variant.
    #[test]
    fn shift_variants() {
        let mut original = interpreter(Variant::Original);
        original.set_register(1, 0x01);
        original.set_register(2, 0x81);
        original.execute(0x8126).unwrap();
        assert_eq!(original.register(1), 0x40);
        assert_eq!(original.register(0xF), 1);
        original.execute(0x812E).unwrap();
        assert_eq!(original.register(1), 0x02);
        assert_eq!(original.register(0xF), 1);

        let mut modern = interpreter(Variant::Modern);
        modern.set_register(1, 0x01);
        modern.set_register(2, 0x81);
        modern.execute(0x8126).unwrap();
        assert_eq!(modern.register(1), 0x00);
        assert_eq!(modern.register(0xF), 1);
        modern.set_register(1, 0x40);
        modern.execute(0x812E).unwrap();
        assert_eq!(modern.register(1), 0x80);
        assert_eq!(modern.register(0xF), 0);
    }

    #[test]
    fn load_store_variants() {
        for &(variant, i_after) in [(Variant::Original, 0x303), (Variant::Modern, 0x300)].iter() {
            let mut interpreter = interpreter(variant);
            interpreter.set_register(0, 7);
            interpreter.set_register(1, 8);
            interpreter.set_register(2, 9);
            interpreter.set_i(0x300);
            interpreter.execute(0xF255).unwrap();
            assert_eq!(&interpreter.mem()[0x300..0x303], &[7, 8, 9]);
            assert_eq!(interpreter.i(), i_after, "{:?}", variant);

            interpreter.set_register(0, 0);
            interpreter.set_register(1, 0);
            interpreter.set_i(0x300);
            interpreter.execute(0xF165).unwrap();
            assert_eq!(interpreter.register(0), 7);
            assert_eq!(interpreter.register(1), 8);
        }
    }

    #[test]
    fn jump_offset_variants() {
        let mut original = interpreter(Variant::Original);
        original.set_register(0, 0x10);
        original.set_register(3, 0x20);
        original.execute(0xB300).unwrap();
        assert_eq!(original.pc(), 0x310);

        let mut modern = interpreter(Variant::Modern);
        modern.set_register(0, 0x10);
        modern.set_register(3, 0x20);
        modern.execute(0xB300).unwrap();
        assert_eq!(modern.pc(), 0x320);
    }

    /// Tests `FX33`.
    #[test]
    fn instruction_ld_b() {
        let cases = [(5, 1, 2, 3), (0xD, 0, 0, 1), (2, 2, 5, 5), (8, 0, 6, 4)];
        let mut interpreter = interpreter(Variant::Original);
        interpreter.set_i(0x400);

        for &(x, n1, n2, n3) in cases.iter() {
            let case = (x, n1, n2, n3);
            interpreter.set_register(x, 100 * n1 + 10 * n2 + n3);
            interpreter.execute(0xF033 | (x as u16) << 8).unwrap();
            assert_eq!(&interpreter.mem()[0x400..0x403], &[n1, n2, n3], "case {:?}", case);
        }
    }

    #[test]
    fn subroutines() {
        let mut interpreter = interpreter(Variant::Original);
        interpreter.load_program(&[0x22, 0x04, 0x00, 0x00, 0x00, 0xEE]).unwrap();
        interpreter.step().unwrap();
        assert_eq!(interpreter.pc(), 0x204);
        interpreter.step().unwrap();
        assert_eq!(interpreter.pc(), 0x202);
        assert!(interpreter.execute(0x00EE).is_err());
    }

    #[test]
    fn stack_overflow_is_an_error() {
        let mut interpreter = interpreter(Variant::Original);
        // Calls itself forever.
        interpreter.load_program(&[0x22, 0x00]).unwrap();
        for _ in 0..16 {
            interpreter.step().unwrap();
        }
        assert!(interpreter.step().is_err());
    }

    #[test]
    fn unknown_opcodes_are_errors() {
        let mut interpreter = interpreter(Variant::Original);
        for &op in [0x5121, 0x8128, 0xE1FF, 0xF1FF].iter() {
            assert!(interpreter.execute(op).is_err(), "{:04X}", op);
        }
    }

    #[test]
    fn load_program_checks_size() {
        let mut interpreter = interpreter(Variant::Original);
        assert!(interpreter.load_program(&[]).is_err());
        assert!(interpreter.load_program(&vec![0; PROG_SIZE + 1]).is_err());
        assert!(interpreter.load_program(&vec![0; PROG_SIZE]).is_ok());
    }

    #[test]
    fn load_program_resets_the_machine() {
        let mut interpreter = interpreter(Variant::Original);
        interpreter.load_program(&[0x60, 0x2A, 0x12, 0x02, 0xFF]).unwrap();
        interpreter.step().unwrap();
        interpreter.step().unwrap();
        assert_eq!(interpreter.register(0), 0x2A);

        interpreter.load_program(&[0x12, 0x00]).unwrap();
        assert_eq!(interpreter.register(0), 0);
        assert_eq!(interpreter.pc(), PROG_START as u16);
        assert_eq!(interpreter.mem()[PROG_START + 4], 0);
    }

    #[test]
    fn font_sprites_are_loaded() {
        let mut interpreter = interpreter(Variant::Original);
        interpreter.set_register(4, 0xA);
        interpreter.execute(0xF429).unwrap();
        let i = interpreter.i() as usize;
        assert_eq!(i, FONT_START + 50);
        assert_eq!(&interpreter.mem()[i..i + 5], &[0xF0, 0x90, 0xF0, 0x90, 0x90]);
    }

    #[test]
    fn draw_sets_collision_flag() {
        let mut interpreter = interpreter(Variant::Original);
        interpreter.set_i(FONT_START as u16);
        interpreter.execute(0xD005).unwrap();
        assert_eq!(interpreter.register(0xF), 0);
        assert!(interpreter.display().pixel(0, 0));
        interpreter.execute(0xD005).unwrap();
        assert_eq!(interpreter.register(0xF), 1);
        assert!(!interpreter.display().pixel(0, 0));
    }

    #[test]
    fn keys_are_forwarded() {
        let mut interpreter = interpreter(Variant::Original);
        interpreter.set_register(3, 0x5);

        interpreter.key_down("KeyW");
        assert!(interpreter.input().is_pressed(Key::K5));
        let pc = interpreter.pc();
        interpreter.execute(0xE39E).unwrap();
        assert_eq!(interpreter.pc(), pc + 2);

        interpreter.key_up();
        interpreter.execute(0xE3A1).unwrap();
        assert_eq!(interpreter.pc(), pc + 4);

        interpreter.key_down("KeyP");
        assert_eq!(interpreter.input().clone(), ::input::State::new());
    }

    /// `FX0A` repeats until a key is pressed.
    #[test]
    fn wait_for_key() {
        let mut interpreter = interpreter(Variant::Original);
        interpreter.load_program(&[0xF7, 0x0A]).unwrap();
        interpreter.step().unwrap();
        interpreter.step().unwrap();
        assert_eq!(interpreter.pc(), PROG_START as u16);

        interpreter.key_down("KeyF");
        interpreter.step().unwrap();
        assert_eq!(interpreter.pc(), PROG_START as u16 + 2);
        assert_eq!(interpreter.register(7), 0xE);
    }

    #[test]
    fn draw_presents_only_changes() {
        let surface = Rc::new(RefCell::new(NullSurface::new()));
        let mut backend = Chip8Backend::with_options(Options::testing(), surface.clone());
        assert!(backend.create(Variant::Original).is_err());
        backend.init().unwrap();
        backend.init().unwrap();

        let mut interpreter = backend.create(Variant::Modern).unwrap();
        assert_eq!(interpreter.variant(), Variant::Modern);
        interpreter.load_rom(&[0x00, 0xE0]).unwrap();
        interpreter.draw().unwrap();
        interpreter.draw().unwrap();
        assert_eq!(surface.borrow().frames(), 1);

        interpreter.cycle().unwrap();
        interpreter.draw().unwrap();
        assert_eq!(surface.borrow().frames(), 2);
    }
}
