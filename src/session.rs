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

//! Starting, stopping and restarting emulation sessions.
//!
//! A session binds one emulator instance to two drivers: a cycle driver, a
//! multiplexed timer stepping the emulator, and a draw driver, a frame chain
//! presenting its display.  The `LoopController` keeps at most one session
//! alive.  Starting a new session always cancels both drivers of the old one
//! before anything else happens, so two sessions never step the emulator
//! concurrently.
//!
//! A failing step or draw ends the session: the failing driver stops itself,
//! and the error is handed out once by `poll`.

use std::cell::{Cell, RefCell};
use std::default::Default;
use std::rc::Rc;

use failure::{Error, ResultExt};

use emulator::Emulator;
use frame::FrameChain;
use multiplexer::{ConfigError, IntervalHandle, Multiplexer};
use platform::{FrameId, Platform};
use rom::RomSource;

/// Options for the loop controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Options {
    /// The period of the cycle driver, in milliseconds (default 2).
    pub cycle_period: f64,
    /// The number of emulator steps per cycle (default 1).
    pub steps_per_cycle: u32,
}

impl Options {
    /// Returns the default set of options.
    pub fn new() -> Self {
        Options {
            cycle_period: 2.0,
            steps_per_cycle: 1,
        }
    }

    /// Checks that the options are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cycle_period.is_finite() {
            return Err(ConfigError::InvalidPeriod(self.cycle_period));
        }
        if self.steps_per_cycle == 0 {
            return Err(ConfigError::ZeroCount("steps per cycle"));
        }
        Ok(())
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::new()
    }
}

/// The driver handles of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandles {
    /// The cycle driver.
    pub cycle: Option<IntervalHandle>,
    /// The frame the draw driver is waiting for.
    pub frame: Option<FrameId>,
}

/// A running session.
struct Session<E> {
    emulator: Rc<RefCell<E>>,
    rom: Option<String>,
    cycle: IntervalHandle,
    draw: FrameChain,
    /// The error that ended the session, if any.
    fault: Rc<RefCell<Option<Error>>>,
}

/// Runs at most one emulation session at a time.
pub struct LoopController<P: Platform, E> {
    multiplexer: Multiplexer<P>,
    options: Options,
    session: Option<Session<E>>,
}

impl<P: Platform + 'static, E: Emulator + 'static> LoopController<P, E> {
    /// Returns a controller scheduling its drivers through `multiplexer`.
    pub fn new(multiplexer: Multiplexer<P>, options: Options) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(LoopController {
            multiplexer,
            options,
            session: None,
        })
    }

    /// Returns the options in use.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Starts a session running `emulator` with the ROM named `selection`.
    ///
    /// Any previous session is stopped first.  An empty selection starts an
    /// idle session, whose drivers run but never step the emulator.  If the
    /// ROM cannot be fetched or loaded, the error is returned and no session
    /// is left running.
    pub fn start_session<R>(&mut self, emulator: E, roms: &R, selection: &str) -> Result<(), Error>
    where
        R: RomSource + ?Sized,
    {
        self.stop_session();

        let mut emulator = emulator;
        let rom = if selection.is_empty() {
            info!("no ROM selected; starting idle session");
            None
        } else {
            let data = roms.fetch(selection)
                .with_context(|_| format!("could not fetch ROM '{}'", selection))?;
            emulator
                .load_rom(&data)
                .with_context(|_| format!("could not load ROM '{}'", selection))?;
            info!("starting session with ROM '{}'", selection);
            Some(selection.to_owned())
        };

        let emulator = Rc::new(RefCell::new(emulator));
        let fault = Rc::new(RefCell::new(None));
        let cycle = self.arm_cycle(&emulator, rom.is_some(), &fault)?;
        let draw = self.arm_draw(&emulator, &fault);
        self.session = Some(Session {
            emulator,
            rom,
            cycle,
            draw,
            fault,
        });
        Ok(())
    }

    /// Stops the current session, if there is one.
    pub fn stop_session(&mut self) {
        if let Some(session) = self.session.take() {
            self.multiplexer.clear_repeating(session.cycle);
            session.draw.cancel(&**self.multiplexer.platform());
            match session.rom {
                Some(ref rom) => info!("stopped session with ROM '{}'", rom),
                None => info!("stopped idle session"),
            }
        }
    }

    /// Returns the error that ended the current session, stopping it.
    ///
    /// Each error is only returned once; afterwards no session is running.
    pub fn poll(&mut self) -> Result<(), Error> {
        let fault = match self.session {
            Some(ref session) => session.fault.borrow_mut().take(),
            None => None,
        };
        match fault {
            Some(e) => {
                self.stop_session();
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// Returns whether a session is running.
    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Returns the name of the ROM the current session runs, if any.
    pub fn rom(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|session| session.rom.as_ref())
            .map(|rom| rom.as_str())
    }

    /// Returns the driver handles of the current session.
    pub fn handles(&self) -> SessionHandles {
        match self.session {
            Some(ref session) => SessionHandles {
                cycle: Some(session.cycle),
                frame: session.draw.pending(),
            },
            None => SessionHandles {
                cycle: None,
                frame: None,
            },
        }
    }

    /// Runs `f` on the emulator of the current session.
    pub fn with_emulator<F, T>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&mut E) -> T,
    {
        self.session
            .as_ref()
            .map(|session| f(&mut *session.emulator.borrow_mut()))
    }

    /// Forwards a key press to the current session.
    pub fn key_down(&self, code: &str) {
        self.with_emulator(|emulator| emulator.key_down(code));
    }

    /// Forwards a key release to the current session.
    pub fn key_up(&self) {
        self.with_emulator(|emulator| emulator.key_up());
    }

    fn arm_cycle(
        &self,
        emulator: &Rc<RefCell<E>>,
        loaded: bool,
        fault: &Rc<RefCell<Option<Error>>>,
    ) -> Result<IntervalHandle, ConfigError> {
        let emulator = emulator.clone();
        let fault = fault.clone();
        let multiplexer = self.multiplexer.clone();
        let steps = self.options.steps_per_cycle;
        let own = Rc::new(Cell::new(None));
        let own_handle = own.clone();

        let handle = self.multiplexer.set_repeating(self.options.cycle_period, move || {
            if !loaded || fault.borrow().is_some() {
                return;
            }
            for _ in 0..steps {
                let result = emulator.borrow_mut().cycle();
                if let Err(e) = result {
                    error!("emulator step failed: {}", e);
                    *fault.borrow_mut() = Some(e);
                    if let Some(handle) = own_handle.get() {
                        multiplexer.clear_repeating(handle);
                    }
                    return;
                }
            }
        })?;
        own.set(Some(handle));
        Ok(handle)
    }

    fn arm_draw(&self, emulator: &Rc<RefCell<E>>, fault: &Rc<RefCell<Option<Error>>>) -> FrameChain {
        let emulator = emulator.clone();
        let fault = fault.clone();

        FrameChain::start(self.multiplexer.platform(), move || {
            if fault.borrow().is_some() {
                return false;
            }
            let result = emulator.borrow_mut().draw();
            match result {
                Ok(()) => true,
                Err(e) => {
                    error!("emulator draw failed: {}", e);
                    *fault.borrow_mut() = Some(e);
                    false
                }
            }
        })
    }
}

impl<P: Platform, E> Drop for LoopController<P, E> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.multiplexer.clear_repeating(session.cycle);
            session.draw.cancel(&**self.multiplexer.platform());
        }
    }
}
