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

//! Keypad state and the mapping from keyboard codes to keys.

use std::collections::HashMap;
use std::default::Default;

use num::traits::FromPrimitive;

/// The number of keys on the Chip-8 keypad.
const N_KEYS: usize = 16;

enum_from_primitive!{
/// The keys on the Chip-8 keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    K0 = 0,
    K1,
    K2,
    K3,
    K4,
    K5,
    K6,
    K7,
    K8,
    K9,
    KA,
    KB,
    KC,
    KD,
    KE,
    KF
}
}

impl Key {
    /// Returns the key corresponding to the lowest four bits of the given
    /// byte.
    pub fn from_byte(b: u8) -> Key {
        Key::from_u8(b % N_KEYS as u8).unwrap()
    }
}

/// The state of the keypad.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    /// The key states (`true` means "pressed").
    keys: [bool; N_KEYS],
}

impl State {
    /// Returns a new input state with all keys unpressed.
    pub fn new() -> Self {
        State::default()
    }

    /// Returns the lowest key that is pressed, and unpresses the key.
    pub fn get_pressed(&mut self) -> Option<Key> {
        for (i, key) in self.keys.iter_mut().enumerate() {
            if *key {
                *key = false;
                return Some(Key::from_usize(i).unwrap());
            }
        }
        None
    }

    /// Returns whether the given key is pressed.
    pub fn is_pressed(&self, key: Key) -> bool {
        self.keys[key as usize]
    }

    /// Presses the given key.
    pub fn press(&mut self, key: Key) {
        self.keys[key as usize] = true;
    }

    /// Releases the given key.
    pub fn release(&mut self, key: Key) {
        self.keys[key as usize] = false;
    }

    /// Releases every key.
    pub fn release_all(&mut self) {
        self.keys = [false; N_KEYS];
    }
}

/// A map from keyboard codes (as in a browser's `KeyboardEvent.code`) to
/// keypad keys.
#[derive(Debug, Clone)]
pub struct Keymap {
    keys: HashMap<&'static str, Key>,
}

impl Keymap {
    /// Returns the usual layout, with the keypad on the left of a QWERTY
    /// keyboard:
    ///
    /// ```text
    /// 1 2 3 4      1 2 3 C
    /// Q W E R  =>  4 5 6 D
    /// A S D F      7 8 9 E
    /// Z X C V      A 0 B F
    /// ```
    pub fn new() -> Self {
        use self::Key::*;

        Keymap::with_keys(hashmap![
            "Digit1" => K1,
            "Digit2" => K2,
            "Digit3" => K3,
            "Digit4" => KC,
            "KeyQ" => K4,
            "KeyW" => K5,
            "KeyE" => K6,
            "KeyR" => KD,
            "KeyA" => K7,
            "KeyS" => K8,
            "KeyD" => K9,
            "KeyF" => KE,
            "KeyZ" => KA,
            "KeyX" => K0,
            "KeyC" => KB,
            "KeyV" => KF,
        ])
    }

    /// Returns a keymap using the given mapping.
    pub fn with_keys(keys: HashMap<&'static str, Key>) -> Self {
        Keymap { keys }
    }

    /// Returns the key bound to the given code, if any.
    pub fn get(&self, code: &str) -> Option<Key> {
        self.keys.get(code).cloned()
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Keymap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let keymap = Keymap::new();
        assert_eq!(keymap.get("Digit1"), Some(Key::K1));
        assert_eq!(keymap.get("KeyX"), Some(Key::K0));
        assert_eq!(keymap.get("KeyV"), Some(Key::KF));
        assert_eq!(keymap.get("KeyP"), None);
    }

    #[test]
    fn get_pressed_takes_the_lowest_key() {
        let mut state = State::new();
        state.press(Key::K9);
        state.press(Key::K3);

        assert_eq!(state.get_pressed(), Some(Key::K3));
        assert_eq!(state.get_pressed(), Some(Key::K9));
        assert_eq!(state.get_pressed(), None);
    }

    #[test]
    fn release_all() {
        let mut state = State::new();
        state.press(Key::KA);
        state.press(Key::K1);
        state.release(Key::K1);
        assert!(state.is_pressed(Key::KA));
        assert!(!state.is_pressed(Key::K1));

        state.release_all();
        assert_eq!(state, State::new());
    }
}
