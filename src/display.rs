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

//! The Chip-8 frame buffer and the surfaces it is presented on.

use std::cell::RefCell;
use std::default::Default;
use std::io::Write;
use std::rc::Rc;

use failure::{Error, ResultExt};

/// The width of the display.
pub const WIDTH: usize = 64;
/// The height of the display.
pub const HEIGHT: usize = 32;

/// The height of a hex digit sprite.
pub const HEX_HEIGHT: usize = 5;

/// The hex digit sprites.
pub const HEX_SPRITES: [[u8; HEX_HEIGHT]; 16] = [
    [0xF0, 0x90, 0x90, 0x90, 0xF0],
    [0x20, 0x60, 0x20, 0x20, 0x70],
    [0xF0, 0x10, 0xF0, 0x80, 0xF0],
    [0xF0, 0x10, 0xF0, 0x10, 0xF0],
    [0x90, 0x90, 0xF0, 0x10, 0x10],
    [0xF0, 0x80, 0xF0, 0x10, 0xF0],
    [0xF0, 0x80, 0xF0, 0x90, 0xF0],
    [0xF0, 0x10, 0x20, 0x40, 0x40],
    [0xF0, 0x90, 0xF0, 0x90, 0xF0],
    [0xF0, 0x90, 0xF0, 0x10, 0xF0],
    [0xF0, 0x90, 0xF0, 0x90, 0x90],
    [0xE0, 0x90, 0xE0, 0x90, 0xE0],
    [0xF0, 0x80, 0x80, 0x80, 0xF0],
    [0xE0, 0x90, 0x90, 0x90, 0xE0],
    [0xF0, 0x80, 0xF0, 0x80, 0xF0],
    [0xF0, 0x80, 0xF0, 0x80, 0x80],
];

/// A Chip-8 frame buffer.
pub struct Buffer {
    /// The pixel data, indexed by column and then row.
    data: [[bool; HEIGHT]; WIDTH],
    /// Whether the buffer changed since it was last presented.
    needs_refresh: bool,
}

impl Buffer {
    /// Returns a new buffer with all pixels clear.
    pub fn new() -> Self {
        Buffer {
            data: [[false; HEIGHT]; WIDTH],
            needs_refresh: true,
        }
    }

    /// Clears the display.
    pub fn clear(&mut self) {
        self.data = [[false; HEIGHT]; WIDTH];
        self.needs_refresh = true;
    }

    /// Returns a reference to the underlying pixel data.
    pub fn data(&self) -> &[[bool; HEIGHT]; WIDTH] {
        &self.data
    }

    /// Returns whether the given pixel is lit.  Pixels off the screen never
    /// are.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < WIDTH && y < HEIGHT && self.data[x][y]
    }

    /// Draws the given sprite with its top left corner at the given position.
    ///
    /// The position wraps around the screen, but the sprite itself is
    /// clipped at the edges.  Returns whether any lit pixel was turned off.
    pub fn draw_sprite(&mut self, sprite: &[u8], x: usize, y: usize) -> bool {
        let x = x % WIDTH;
        let y = y % HEIGHT;
        let mut collision = false;

        for (j, row) in sprite.iter().enumerate() {
            for i in 0..8 {
                if row & (1 << (7 - i)) != 0 && self.toggle(x + i, y + j) {
                    collision = true;
                }
            }
        }

        collision
    }

    /// Forces a refresh on the next call to `refresh`, even if nothing was
    /// drawn.
    pub fn force_refresh(&mut self) {
        self.needs_refresh = true;
    }

    /// Returns whether the buffer changed since it was last presented.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Refreshes the display using the given refresh function.
    ///
    /// If nothing changed since the last refresh, nothing will be done.
    pub fn refresh<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&Self) -> Result<(), Error>,
    {
        if self.needs_refresh {
            f(self)?;
            self.needs_refresh = false;
        }
        Ok(())
    }

    /// Flips the given pixel, returning whether it was turned off.
    fn toggle(&mut self, x: usize, y: usize) -> bool {
        if x < WIDTH && y < HEIGHT {
            let old = self.data[x][y];
            self.data[x][y] = !old;
            self.needs_refresh = true;
            old
        } else {
            false
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}

/// Something a frame buffer can be presented on.
pub trait Surface {
    /// Presents the given buffer.
    fn present(&mut self, buffer: &Buffer) -> Result<(), Error>;
}

impl<S: Surface + ?Sized> Surface for Box<S> {
    fn present(&mut self, buffer: &Buffer) -> Result<(), Error> {
        (**self).present(buffer)
    }
}

/// A surface shared between several emulator instances.
impl<S: Surface + ?Sized> Surface for Rc<RefCell<S>> {
    fn present(&mut self, buffer: &Buffer) -> Result<(), Error> {
        self.borrow_mut().present(buffer)
    }
}

/// A surface that only counts the frames presented on it.
#[derive(Debug, Default)]
pub struct NullSurface {
    frames: u64,
}

impl NullSurface {
    pub fn new() -> Self {
        NullSurface::default()
    }

    /// Returns the number of frames presented.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Surface for NullSurface {
    fn present(&mut self, _: &Buffer) -> Result<(), Error> {
        self.frames += 1;
        Ok(())
    }
}

/// A surface drawing the buffer as text, two pixel rows per line.
pub struct TextSurface<W: Write> {
    out: W,
    /// Whether to move the cursor home before each frame.
    home: bool,
}

impl<W: Write> TextSurface<W> {
    /// Returns a surface that redraws in place on an ANSI terminal.
    pub fn terminal(out: W) -> Self {
        TextSurface { out, home: true }
    }

    /// Returns a surface that writes frames one after another.
    pub fn plain(out: W) -> Self {
        TextSurface { out, home: false }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Surface for TextSurface<W> {
    fn present(&mut self, buffer: &Buffer) -> Result<(), Error> {
        let mut frame = String::with_capacity((WIDTH * 3 + 1) * HEIGHT / 2 + 8);
        if self.home {
            frame.push_str("\x1b[H");
        }
        for y in (0..HEIGHT).step_by(2) {
            for x in 0..WIDTH {
                frame.push(match (buffer.pixel(x, y), buffer.pixel(x, y + 1)) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                });
            }
            frame.push('\n');
        }
        self.out
            .write_all(frame.as_bytes())
            .and_then(|_| self.out.flush())
            .context("could not write frame")?;
        Ok(())
    }
}
