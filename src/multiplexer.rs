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

//! Repeating timers with periods finer than the platform can deliver.
//!
//! The native timer of a platform is only reliable down to a certain
//! granularity (10ms in a browser).  A `Multiplexer` accepts any period: at or
//! above the granularity it hands the request straight to the platform, and
//! below it registers a single native timer at the granularity and runs the
//! callback several times in a row on every native tick (a "burst").
//!
//! Each multiplexed timer has an entry in the multiplexer's suppression table.
//! Cancelling the timer sets the entry's flag, which a burst checks before
//! every firing, so cancellation takes effect even in the middle of a burst.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use platform::{Platform, TimerId, MIN_NATIVE_PERIOD};

/// The default native timer granularity, in milliseconds.
pub const DEFAULT_GRANULARITY: f64 = 10.0;
/// The default smallest period a timer may have, in milliseconds.
pub const DEFAULT_MIN_PERIOD: f64 = 0.001;

/// An error in the configuration of a timer.
#[derive(Debug, Fail)]
pub enum ConfigError {
    #[fail(display = "invalid timer period {}", _0)]
    InvalidPeriod(f64),
    #[fail(display = "invalid timer granularity {}", _0)]
    InvalidGranularity(f64),
    #[fail(display = "minimum period {} must be positive and below the granularity {}", _0, _1)]
    InvalidMinPeriod(f64, f64),
    #[fail(display = "{} must be at least 1", _0)]
    ZeroCount(&'static str),
}

/// Options for the multiplexer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Options {
    /// The smallest period at which the native timer fires reliably (default
    /// 10ms).  It may not be below the platform's `MIN_NATIVE_PERIOD`.
    pub granularity: f64,
    /// The period used in place of zero and negative periods (default
    /// 0.001ms).
    pub min_period: f64,
}

impl Options {
    /// Returns the default set of options.
    pub fn new() -> Self {
        Options {
            granularity: DEFAULT_GRANULARITY,
            min_period: DEFAULT_MIN_PERIOD,
        }
    }

    /// Checks that the options describe a usable multiplexer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.granularity.is_finite() || self.granularity < MIN_NATIVE_PERIOD {
            return Err(ConfigError::InvalidGranularity(self.granularity));
        }
        if !self.min_period.is_finite() || self.min_period <= 0.0
            || self.min_period >= self.granularity
        {
            return Err(ConfigError::InvalidMinPeriod(
                self.min_period,
                self.granularity,
            ));
        }
        Ok(())
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::new()
    }
}

/// A handle to a timer registered through a multiplexer.
///
/// Native ids may be recycled by the platform once a timer is cleared, so
/// every handle also carries a generation that is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalHandle {
    /// A timer handed directly to the platform.
    Native(TimerId, u64),
    /// A timer fired in bursts from a native timer at the granularity.
    Multiplexed(TimerId, u64),
}

impl IntervalHandle {
    /// Returns the id of the underlying native timer.
    pub fn timer_id(&self) -> TimerId {
        match *self {
            IntervalHandle::Native(id, _) | IntervalHandle::Multiplexed(id, _) => id,
        }
    }

    /// Returns the generation of the handle.
    pub fn generation(&self) -> u64 {
        match *self {
            IntervalHandle::Native(_, generation) | IntervalHandle::Multiplexed(_, generation) => {
                generation
            }
        }
    }
}

/// The suppression table entry of a multiplexed timer.
#[derive(Debug)]
struct Suppression {
    timer: TimerId,
    cancelled: bool,
    in_burst: bool,
}

type Table = RefCell<HashMap<u64, Suppression>>;

/// Returns how many times a timer with the given period fires per native
/// tick.  Fractional firings are dropped.
pub fn firings_per_tick(granularity: f64, period: f64) -> u64 {
    (granularity / period).floor() as u64
}

/// A source of repeating timers of arbitrary period.
///
/// Cloning a multiplexer yields another handle onto the same suppression
/// table, so a timer can be cleared through any clone.
pub struct Multiplexer<P: Platform> {
    platform: Rc<P>,
    options: Options,
    table: Rc<Table>,
    /// The live pass-through timers, by generation.
    natives: Rc<RefCell<HashMap<u64, TimerId>>>,
    generation: Rc<Cell<u64>>,
}

impl<P: Platform> Clone for Multiplexer<P> {
    fn clone(&self) -> Self {
        Multiplexer {
            platform: self.platform.clone(),
            options: self.options,
            table: self.table.clone(),
            natives: self.natives.clone(),
            generation: self.generation.clone(),
        }
    }
}

impl<P: Platform> Multiplexer<P> {
    /// Returns a multiplexer with the default options.
    pub fn new(platform: Rc<P>) -> Self {
        Multiplexer {
            platform,
            options: Options::default(),
            table: Rc::new(RefCell::new(HashMap::new())),
            natives: Rc::new(RefCell::new(HashMap::new())),
            generation: Rc::new(Cell::new(0)),
        }
    }

    /// Returns a multiplexer using the given options.
    pub fn with_options(platform: Rc<P>, options: Options) -> Result<Self, ConfigError> {
        options.validate()?;
        let mut multiplexer = Multiplexer::new(platform);
        multiplexer.options = options;
        Ok(multiplexer)
    }

    /// Returns the options in use.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the underlying platform.
    pub fn platform(&self) -> &Rc<P> {
        &self.platform
    }

    /// Registers `callback` to run every `period` milliseconds.
    ///
    /// Periods at or above the granularity go straight to the platform.
    /// Smaller periods (with zero and negative ones raised to the minimum
    /// period) run as bursts of `firings_per_tick` calls on each native tick.
    pub fn set_repeating<F>(&self, period: f64, callback: F) -> Result<IntervalHandle, ConfigError>
    where
        F: FnMut() + 'static,
    {
        if !period.is_finite() {
            return Err(ConfigError::InvalidPeriod(period));
        }
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        if period >= self.options.granularity {
            let id = self.platform.set_interval(period, Box::new(callback));
            self.natives.borrow_mut().insert(generation, id);
            debug!("registered native timer {:?}/{} every {}ms", id, generation, period);
            return Ok(IntervalHandle::Native(id, generation));
        }

        let period = if period <= 0.0 {
            self.options.min_period
        } else {
            period
        };
        let firings = firings_per_tick(self.options.granularity, period);

        let table = self.table.clone();
        let mut callback = callback;
        let id = self.platform.set_interval(
            self.options.granularity,
            Box::new(move || burst(&table, generation, firings, &mut callback)),
        );
        self.table.borrow_mut().insert(
            generation,
            Suppression {
                timer: id,
                cancelled: false,
                in_burst: false,
            },
        );
        debug!(
            "registered multiplexed timer {:?}/{} every {}ms ({} per tick)",
            id, generation, period, firings
        );
        Ok(IntervalHandle::Multiplexed(id, generation))
    }

    /// Registers `callback` to run every `period` milliseconds with `args`.
    pub fn set_repeating_with<A, F>(
        &self,
        period: f64,
        mut callback: F,
        args: A,
    ) -> Result<IntervalHandle, ConfigError>
    where
        A: 'static,
        F: FnMut(&A) + 'static,
    {
        self.set_repeating(period, move || callback(&args))
    }

    /// Cancels a timer.
    ///
    /// No further native ticks will occur, and a burst in progress stops
    /// before its next firing.  Clearing a stale handle does nothing.
    pub fn clear_repeating(&self, handle: IntervalHandle) {
        let (id, generation) = match handle {
            IntervalHandle::Native(id, generation) => {
                let live = self.natives.borrow().get(&generation) == Some(&id);
                if live {
                    self.natives.borrow_mut().remove(&generation);
                    debug!("clearing native timer {:?}/{}", id, generation);
                    self.platform.clear_interval(id);
                } else {
                    trace!("timer {:?}/{} is not registered", id, generation);
                }
                return;
            }
            IntervalHandle::Multiplexed(id, generation) => (id, generation),
        };

        {
            let mut table = self.table.borrow_mut();
            let retire_now = match table.get_mut(&generation) {
                Some(entry) => {
                    if entry.cancelled || entry.timer != id {
                        trace!("timer {:?}/{} already cancelled", id, generation);
                        return;
                    }
                    entry.cancelled = true;
                    !entry.in_burst
                }
                None => {
                    trace!("timer {:?}/{} is not registered", id, generation);
                    return;
                }
            };
            if retire_now {
                table.remove(&generation);
            }
        }
        debug!("clearing multiplexed timer {:?}/{}", id, generation);
        self.platform.clear_interval(id);
    }

    /// Returns whether the timer behind `handle` may still fire.
    pub fn is_active(&self, handle: IntervalHandle) -> bool {
        match handle {
            IntervalHandle::Native(id, generation) => {
                self.natives.borrow().get(&generation) == Some(&id)
            }
            IntervalHandle::Multiplexed(id, generation) => match self.table.borrow().get(&generation) {
                Some(entry) => entry.timer == id && !entry.cancelled,
                None => false,
            },
        }
    }

    /// Returns the number of entries in the suppression table.
    pub fn pending(&self) -> usize {
        self.table.borrow().len()
    }
}

/// Runs one native tick's worth of firings for the timer of `generation`.
fn burst<F: FnMut()>(table: &Table, generation: u64, firings: u64, callback: &mut F) {
    match table.borrow_mut().get_mut(&generation) {
        Some(entry) => entry.in_burst = true,
        None => return,
    }
    trace!("burst of {} for timer {}", firings, generation);

    for fired in 0..firings {
        let live = match table.borrow().get(&generation) {
            Some(entry) => !entry.cancelled,
            None => false,
        };
        if !live {
            trace!("timer {} suppressed after {} firings", generation, fired);
            table.borrow_mut().remove(&generation);
            return;
        }
        callback();
    }

    let mut table = table.borrow_mut();
    let cancelled = match table.get_mut(&generation) {
        Some(entry) => {
            entry.in_burst = false;
            entry.cancelled
        }
        None => false,
    };
    if cancelled {
        table.remove(&generation);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use platform::{ManualPlatform, Platform};

    use super::*;

    fn setup() -> (Rc<ManualPlatform>, Multiplexer<ManualPlatform>) {
        let platform = Rc::new(ManualPlatform::new());
        let multiplexer = Multiplexer::new(platform.clone());
        (platform, multiplexer)
    }

    fn counter() -> (Rc<Cell<u64>>, impl FnMut() + 'static) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        (count, move || c.set(c.get() + 1))
    }

    #[test]
    fn long_periods_pass_through() {
        let (platform, multiplexer) = setup();
        let (count, f) = counter();
        let handle = multiplexer.set_repeating(25.0, f).unwrap();

        match handle {
            IntervalHandle::Native(..) => {}
            h => panic!("expected a native handle, got {:?}", h),
        }
        assert_eq!(multiplexer.pending(), 0);
        platform.advance(100.0);
        assert_eq!(count.get(), 4);
    }

    /// A period equal to the granularity takes the native path as well.
    #[test]
    fn granularity_period_is_native() {
        let (platform, multiplexer) = setup();
        let (count, f) = counter();
        let handle = multiplexer.set_repeating(10.0, f).unwrap();

        assert_eq!(
            handle,
            IntervalHandle::Native(handle.timer_id(), handle.generation())
        );
        assert!(multiplexer.is_active(handle));
        platform.advance(30.0);
        assert_eq!(count.get(), 3);
        multiplexer.clear_repeating(handle);
        assert_eq!(platform.active_intervals(), 0);
        assert!(!multiplexer.is_active(handle));
    }

    #[test]
    fn one_ms_period_fires_ten_times_per_tick() {
        let (platform, multiplexer) = setup();
        let (count, f) = counter();
        multiplexer.set_repeating(1.0, f).unwrap();

        assert_eq!(platform.advance(10.0), 1);
        assert_eq!(count.get(), 10);
        assert_eq!(platform.active_intervals(), 1);
    }

    #[test]
    fn firings_are_truncated() {
        let cases = [
            (2.0, 5),
            (3.0, 3),
            (4.0, 2),
            (6.0, 1),
            (9.99, 1),
            (0.5, 20),
            (2.5, 4),
        ];

        for &(period, expected) in cases.iter() {
            let (platform, multiplexer) = setup();
            let (count, f) = counter();
            multiplexer.set_repeating(period, f).unwrap();
            platform.advance(10.0);
            assert_eq!(count.get(), expected, "period {}", period);
            platform.advance(10.0);
            assert_eq!(count.get(), 2 * expected, "period {}", period);
        }
    }

    #[test]
    fn non_positive_periods_are_clamped() {
        for &period in [0.0, -5.0].iter() {
            let (platform, multiplexer) = setup();
            let (count, f) = counter();
            multiplexer.set_repeating(period, f).unwrap();
            platform.advance(10.0);
            assert_eq!(
                count.get(),
                firings_per_tick(DEFAULT_GRANULARITY, DEFAULT_MIN_PERIOD),
                "period {}",
                period
            );
        }
    }

    /// Positive periods below the minimum period are used as they are.
    #[test]
    fn tiny_positive_periods_are_not_clamped() {
        let (platform, multiplexer) = setup();
        let (count, f) = counter();
        multiplexer.set_repeating(0.0005, f).unwrap();
        platform.advance(10.0);

        let expected = firings_per_tick(DEFAULT_GRANULARITY, 0.0005);
        assert!(expected > firings_per_tick(DEFAULT_GRANULARITY, DEFAULT_MIN_PERIOD));
        assert_eq!(count.get(), expected);
    }

    #[test]
    fn non_finite_periods_are_rejected() {
        let (platform, multiplexer) = setup();
        assert!(multiplexer.set_repeating(::std::f64::NAN, || {}).is_err());
        assert!(multiplexer.set_repeating(::std::f64::INFINITY, || {}).is_err());
        assert_eq!(platform.active_intervals(), 0);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let platform = Rc::new(ManualPlatform::new());
        let bad = [
            Options {
                granularity: 0.0,
                min_period: 0.001,
            },
            Options {
                granularity: 10.0,
                min_period: 10.0,
            },
            Options {
                granularity: 10.0,
                min_period: -1.0,
            },
            Options {
                granularity: 0.5,
                min_period: 0.001,
            },
        ];
        for options in bad.iter() {
            assert!(Multiplexer::with_options(platform.clone(), *options).is_err());
        }
        assert!(Multiplexer::with_options(platform, Options::new()).is_ok());
    }

    #[test]
    fn cancel_mid_burst_stops_the_burst() {
        let (platform, multiplexer) = setup();
        let count = Rc::new(Cell::new(0));
        let handle = Rc::new(Cell::new(None));
        let (c, h, m) = (count.clone(), handle.clone(), multiplexer.clone());
        let registered = multiplexer
            .set_repeating(1.0, move || {
                c.set(c.get() + 1);
                if c.get() == 4 {
                    m.clear_repeating(h.get().unwrap());
                }
            })
            .unwrap();
        handle.set(Some(registered));

        platform.advance(10.0);
        assert_eq!(count.get(), 4);
        assert_eq!(multiplexer.pending(), 0);
        assert_eq!(platform.active_intervals(), 0);
        platform.advance(100.0);
        assert_eq!(count.get(), 4);
    }

    /// Cancelling on the last firing of a burst still retires the entry.
    #[test]
    fn cancel_on_last_firing() {
        let (platform, multiplexer) = setup();
        let count = Rc::new(Cell::new(0));
        let handle = Rc::new(Cell::new(None));
        let (c, h, m) = (count.clone(), handle.clone(), multiplexer.clone());
        let registered = multiplexer
            .set_repeating(5.0, move || {
                c.set(c.get() + 1);
                if c.get() == 2 {
                    m.clear_repeating(h.get().unwrap());
                }
            })
            .unwrap();
        handle.set(Some(registered));

        platform.advance(50.0);
        assert_eq!(count.get(), 2);
        assert_eq!(multiplexer.pending(), 0);
        assert!(!multiplexer.is_active(registered));
    }

    #[test]
    fn cancel_between_ticks() {
        let (platform, multiplexer) = setup();
        let (count, f) = counter();
        let handle = multiplexer.set_repeating(2.0, f).unwrap();

        platform.advance(10.0);
        assert!(multiplexer.is_active(handle));
        multiplexer.clear_repeating(handle);
        assert!(!multiplexer.is_active(handle));
        assert_eq!(multiplexer.pending(), 0);
        platform.advance(100.0);
        assert_eq!(count.get(), 5);
    }

    #[test]
    fn stale_cancel_is_a_no_op() {
        let (platform, multiplexer) = setup();
        let handle = multiplexer.set_repeating(1.0, || {}).unwrap();
        multiplexer.clear_repeating(handle);
        multiplexer.clear_repeating(handle);
        multiplexer.clear_repeating(IntervalHandle::Multiplexed(TimerId(99), 99));
        multiplexer.clear_repeating(IntervalHandle::Native(TimerId(99), 99));
        assert_eq!(platform.active_intervals(), 0);
    }

    /// A stale handle must not cancel a new timer that was given the same
    /// native id.
    #[test]
    fn recycled_ids_are_not_cancelled_by_stale_handles() {
        let platform = Rc::new(ManualPlatform::with_id_reuse());
        let multiplexer = Multiplexer::new(platform.clone());
        let old = multiplexer.set_repeating(1.0, || {}).unwrap();
        multiplexer.clear_repeating(old);

        let (count, f) = counter();
        let new = multiplexer.set_repeating(1.0, f).unwrap();
        assert_eq!(old.timer_id(), new.timer_id());
        assert_ne!(old, new);

        multiplexer.clear_repeating(old);
        platform.advance(10.0);
        assert_eq!(count.get(), 10);
        assert!(multiplexer.is_active(new));
    }

    /// A stale pass-through handle must not cancel a multiplexed timer that
    /// was given the same native id.
    #[test]
    fn recycled_ids_are_not_cancelled_by_stale_native_handles() {
        let platform = Rc::new(ManualPlatform::with_id_reuse());
        let multiplexer = Multiplexer::new(platform.clone());
        let old = multiplexer.set_repeating(20.0, || {}).unwrap();
        multiplexer.clear_repeating(old);

        let (count, f) = counter();
        let new = multiplexer.set_repeating(1.0, f).unwrap();
        assert_eq!(old.timer_id(), new.timer_id());

        multiplexer.clear_repeating(old);
        assert!(!multiplexer.is_active(old));
        platform.advance(10.0);
        assert_eq!(count.get(), 10);
        assert!(multiplexer.is_active(new));
        assert_eq!(platform.active_intervals(), 1);

        multiplexer.clear_repeating(new);
        assert_eq!(multiplexer.pending(), 0);
        assert_eq!(platform.active_intervals(), 0);
    }

    #[test]
    fn independent_multiplexers_do_not_share_tables() {
        let platform = Rc::new(ManualPlatform::new());
        let a = Multiplexer::new(platform.clone());
        let b = Multiplexer::new(platform.clone());
        let (count, f) = counter();
        let handle = a.set_repeating(1.0, f).unwrap();

        b.clear_repeating(handle);
        platform.advance(10.0);
        assert_eq!(count.get(), 10);
        assert_eq!(a.pending(), 1);
        assert_eq!(b.pending(), 0);
    }

    #[test]
    fn extra_arguments_are_passed() {
        let (platform, multiplexer) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        multiplexer
            .set_repeating_with(5.0, move |&(a, b): &(u8, u8)| s.borrow_mut().push(a + b), (1, 2))
            .unwrap();

        platform.advance(10.0);
        assert_eq!(*seen.borrow(), vec![3, 3]);
    }

    /// Firings happen synchronously inside the native tick.
    #[test]
    fn bursts_are_synchronous() {
        let (platform, multiplexer) = setup();
        let times = Rc::new(RefCell::new(Vec::new()));
        let (t, p) = (times.clone(), platform.clone());
        multiplexer
            .set_repeating(2.0, move || t.borrow_mut().push(p.now()))
            .unwrap();

        platform.advance(20.0);
        assert_eq!(
            *times.borrow(),
            vec![10.0, 10.0, 10.0, 10.0, 10.0, 20.0, 20.0, 20.0, 20.0, 20.0]
        );
    }
}
