/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! A scheduling harness for running Chip-8 emulators.
//!
//! The harness drives an emulator with two loops: a cycle loop, which steps
//! the emulator on a repeating timer, and a draw loop, which presents its
//! display once per frame.  Host timers cannot fire more often than every few
//! milliseconds, so timers faster than that are multiplexed: each one is run
//! as a burst of callbacks on a coarser native timer (see `multiplexer`).
//!
//! The `LoopController` ties these together and makes sure that restarting a
//! session, for example to switch ROMs, never leaves the old loops running.

#[macro_use]
extern crate enum_primitive;
extern crate failure;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate maplit;
extern crate num;
extern crate rand;
extern crate time;

/// The size of the Chip-8's memory, in bytes.
pub const MEM_SIZE: usize = 0x1000;
/// The address where programs should be loaded.
pub const PROG_START: usize = 0x200;
/// The maximum size of a Chip-8 program, in bytes.
pub const PROG_SIZE: usize = MEM_SIZE - PROG_START;
/// The address where the hex digit sprites are stored.
pub const FONT_START: usize = 0x50;
/// The maximum depth of nested subroutine calls.
pub const STACK_SIZE: usize = 16;

pub mod display;
pub mod emulator;
pub mod frame;
pub mod input;
pub mod interpreter;
pub mod multiplexer;
pub mod platform;
pub mod rom;
pub mod session;
mod timer;

pub use emulator::{Backend, Emulator, Variant};
pub use frame::FrameChain;
pub use interpreter::{Chip8Backend, Interpreter};
pub use multiplexer::{IntervalHandle, Multiplexer};
pub use platform::{ManualPlatform, Platform, RealtimePlatform};
pub use rom::{RomDirectory, RomSource};
pub use session::LoopController;
