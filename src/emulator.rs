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

//! The interface through which a session drives an emulator.

use failure::Error;
use num::traits::FromPrimitive;

enum_from_primitive!{
/// The compatibility mode of an emulator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// The behavior of the COSMAC VIP interpreter.
    Original = 0,
    /// The behavior most later interpreters settled on.
    Modern = 1
}
}

impl Variant {
    /// Returns the variant with the given numeric code.
    pub fn from_code(code: i32) -> Result<Variant, UnknownVariantError> {
        Variant::from_i32(code).ok_or(UnknownVariantError(code))
    }
}

impl Default for Variant {
    fn default() -> Self {
        Variant::Original
    }
}

/// An error resulting from an unknown variant code.
#[derive(Debug, Fail)]
#[fail(display = "unknown compatibility variant {}", _0)]
pub struct UnknownVariantError(pub i32);

/// An error resulting from creating an instance before initialization.
#[derive(Debug, Fail)]
#[fail(display = "emulator backend has not been initialized")]
pub struct NotInitializedError;

/// A running emulator instance.
pub trait Emulator {
    /// Replaces program memory with the given ROM.
    fn load_rom(&mut self, rom: &[u8]) -> Result<(), Error>;
    /// Advances execution by one step.
    fn cycle(&mut self) -> Result<(), Error>;
    /// Presents the current frame buffer.
    fn draw(&mut self) -> Result<(), Error>;
    /// Forwards a key press, identified by its keyboard code (e.g. `KeyQ`).
    fn key_down(&mut self, code: &str);
    /// Forwards a key release.
    fn key_up(&mut self);
}

/// A factory of emulator instances.
pub trait Backend {
    /// The type of instance created.
    type Instance: Emulator;

    /// Performs one-time setup.  Calling this again has no effect.
    fn init(&mut self) -> Result<(), Error>;
    /// Creates an instance in the given compatibility mode.
    fn create(&mut self, variant: Variant) -> Result<Self::Instance, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_codes() {
        assert_eq!(Variant::from_code(0).unwrap(), Variant::Original);
        assert_eq!(Variant::from_code(1).unwrap(), Variant::Modern);
        assert!(Variant::from_code(2).is_err());
        assert!(Variant::from_code(-1).is_err());
    }
}
