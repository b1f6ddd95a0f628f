/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! A tick counter for the delay and sound timers.

use time;

/// Counts ticks of a fixed frequency against a monotonic clock.
#[derive(Debug)]
pub struct Timer {
    /// Whether the timer is enabled.
    enabled: bool,
    /// The frequency of ticks, in Hz.
    frequency: u32,
    /// The total number of ticks counted at the last lap.
    ticks: u64,
}

impl Timer {
    /// Returns a new timer running at the given frequency, starting now.
    pub fn new(frequency: u32) -> Self {
        let mut timer = Timer::new_disabled(frequency);
        timer.enabled = true;
        timer.ticks = timer.ticks_at(time::precise_time_ns());
        timer
    }

    /// Returns a new timer at the given frequency which never ticks.
    pub fn new_disabled(frequency: u32) -> Self {
        Timer {
            enabled: false,
            frequency,
            ticks: 0,
        }
    }

    /// Returns the number of ticks elapsed since the last lap.
    ///
    /// A disabled timer always returns 0.
    pub fn lap(&mut self) -> u32 {
        if self.enabled {
            self.lap_at(time::precise_time_ns())
        } else {
            0
        }
    }

    /// Returns the number of ticks elapsed between the last lap and the clock
    /// reading `now` (in nanoseconds).
    pub fn lap_at(&mut self, now: u64) -> u32 {
        let ticks = self.ticks_at(now);
        let elapsed = ticks.saturating_sub(self.ticks);
        if ticks > self.ticks {
            self.ticks = ticks;
        }
        elapsed.min(u32::max_value() as u64) as u32
    }

    fn ticks_at(&self, now: u64) -> u64 {
        (now as f64 * self.frequency as f64 / 1e9) as u64
    }
}
