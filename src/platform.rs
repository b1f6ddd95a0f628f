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

//! The timing primitives provided by the host platform.
//!
//! A platform offers two kinds of callbacks: repeating timers, which fire at a
//! fixed period, and frame callbacks, which fire once before the next frame is
//! presented.  Everything runs on a single thread; a callback always runs to
//! completion before the next one is dispatched.
//!
//! Two implementations are provided.  `ManualPlatform` runs on a virtual clock
//! that only moves when told to, which makes it suitable for tests and offline
//! stepping.  `RealtimePlatform` follows the wall clock and sleeps between
//! deadlines.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use time;

/// The smallest period a native timer will fire at, in milliseconds.
pub const MIN_NATIVE_PERIOD: f64 = 1.0;
/// The default time between frames, in milliseconds.
pub const DEFAULT_FRAME_PERIOD: f64 = 1000.0 / 60.0;

/// The identifier of a native repeating timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u32);

/// The identifier of a pending frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u32);

/// A callback for a repeating timer.
pub type Callback = Box<dyn FnMut()>;
/// A callback for a single frame.
pub type FrameCallback = Box<dyn FnOnce()>;

/// The timing primitives of a host platform.
///
/// All methods take `&self` so that callbacks may register and cancel other
/// callbacks (or themselves) while they are running.
pub trait Platform {
    /// Registers `callback` to run every `period` milliseconds.
    fn set_interval(&self, period: f64, callback: Callback) -> TimerId;
    /// Cancels a repeating timer.  Unknown ids are ignored.
    fn clear_interval(&self, id: TimerId);
    /// Registers `callback` to run once on the next frame.
    fn request_frame(&self, callback: FrameCallback) -> FrameId;
    /// Cancels a pending frame callback.  Unknown ids are ignored.
    fn cancel_frame(&self, id: FrameId);
    /// Returns the current time in milliseconds.
    fn now(&self) -> f64;
}

/// A registered repeating timer.
struct Interval {
    period: f64,
    next_due: f64,
    /// Registration order, used to break ties between equal deadlines.
    seq: u64,
    callback: Rc<RefCell<Callback>>,
}

/// The timer bookkeeping shared by both platforms.
struct Queue {
    now: f64,
    min_period: f64,
    reuse_ids: bool,
    last_timer: u32,
    last_frame: u32,
    seq: u64,
    intervals: BTreeMap<TimerId, Interval>,
    frames: Vec<(FrameId, FrameCallback)>,
}

impl Queue {
    fn new(min_period: f64, reuse_ids: bool) -> Self {
        Queue {
            now: 0.0,
            min_period,
            reuse_ids,
            last_timer: 0,
            last_frame: 0,
            seq: 0,
            intervals: BTreeMap::new(),
            frames: Vec::new(),
        }
    }

    fn timer_id(&mut self) -> TimerId {
        if self.reuse_ids {
            let mut id = 1;
            while self.intervals.contains_key(&TimerId(id)) {
                id += 1;
            }
            TimerId(id)
        } else {
            self.last_timer += 1;
            TimerId(self.last_timer)
        }
    }

    fn add_interval(&mut self, period: f64, callback: Callback) -> TimerId {
        let period = if period < self.min_period {
            self.min_period
        } else {
            period
        };
        let id = self.timer_id();
        self.seq += 1;
        self.intervals.insert(
            id,
            Interval {
                period,
                next_due: self.now + period,
                seq: self.seq,
                callback: Rc::new(RefCell::new(callback)),
            },
        );
        id
    }

    fn add_frame(&mut self, callback: FrameCallback) -> FrameId {
        self.last_frame += 1;
        let id = FrameId(self.last_frame);
        self.frames.push((id, callback));
        id
    }

    fn cancel_frame(&mut self, id: FrameId) {
        self.frames.retain(|&(f, _)| f != id);
    }

    fn take_frame(&mut self, id: FrameId) -> Option<FrameCallback> {
        let pos = self.frames.iter().position(|&(f, _)| f == id)?;
        Some(self.frames.remove(pos).1)
    }

    /// Returns the timer that fires next, along with its deadline.
    fn next_due(&self) -> Option<(TimerId, f64)> {
        self.intervals
            .iter()
            .min_by(|a, b| {
                let (a, b) = (a.1, b.1);
                a.next_due
                    .partial_cmp(&b.next_due)
                    .unwrap_or(::std::cmp::Ordering::Equal)
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|(&id, interval)| (id, interval.next_due))
    }

    /// Takes the next timer due at or before `deadline`, rescheduling it and
    /// moving the clock up to its deadline.
    fn pop_due(&mut self, deadline: f64) -> Option<Rc<RefCell<Callback>>> {
        let (id, due) = match self.next_due() {
            Some((id, due)) if due <= deadline => (id, due),
            _ => return None,
        };
        if due > self.now {
            self.now = due;
        }
        let now = self.now;
        let interval = self.intervals.get_mut(&id)?;
        interval.next_due = due + interval.period;
        if interval.next_due <= now {
            // Missed ticks are dropped rather than replayed.
            interval.next_due = now + interval.period;
        }
        Some(interval.callback.clone())
    }
}

/// Runs every timer due at or before `deadline`, returning how many ran.
fn dispatch_due(queue: &RefCell<Queue>, deadline: f64) -> usize {
    let mut ticks = 0;
    loop {
        let next = queue.borrow_mut().pop_due(deadline);
        let callback = match next {
            Some(callback) => callback,
            None => break,
        };
        (&mut *callback.borrow_mut())();
        ticks += 1;
    }
    ticks
}

/// Runs every frame callback pending at the start of the frame.
fn dispatch_frame(queue: &RefCell<Queue>) -> usize {
    let batch: Vec<FrameId> = queue.borrow().frames.iter().map(|&(id, _)| id).collect();
    let mut fired = 0;
    for id in batch {
        let callback = queue.borrow_mut().take_frame(id);
        if let Some(callback) = callback {
            callback();
            fired += 1;
        }
    }
    fired
}

/// A platform running on a virtual clock.
///
/// Time only moves forward through `advance`, and frames are only presented
/// through `fire_frame`.
pub struct ManualPlatform {
    queue: RefCell<Queue>,
}

impl ManualPlatform {
    /// Returns a platform whose timer ids are never reused.
    pub fn new() -> Self {
        ManualPlatform {
            queue: RefCell::new(Queue::new(MIN_NATIVE_PERIOD, false)),
        }
    }

    /// Returns a platform that hands out the lowest free timer id, so that ids
    /// of cancelled timers come back.
    pub fn with_id_reuse() -> Self {
        ManualPlatform {
            queue: RefCell::new(Queue::new(MIN_NATIVE_PERIOD, true)),
        }
    }

    /// Moves the clock forward by `ms`, running every timer tick that falls
    /// due.  Returns the number of native ticks dispatched.
    pub fn advance(&self, ms: f64) -> usize {
        let deadline = self.queue.borrow().now + ms;
        let ticks = dispatch_due(&self.queue, deadline);
        self.queue.borrow_mut().now = deadline;
        ticks
    }

    /// Presents one frame, returning the number of frame callbacks run.
    pub fn fire_frame(&self) -> usize {
        dispatch_frame(&self.queue)
    }

    /// Returns the number of registered repeating timers.
    pub fn active_intervals(&self) -> usize {
        self.queue.borrow().intervals.len()
    }

    /// Returns the number of frame callbacks waiting for the next frame.
    pub fn pending_frames(&self) -> usize {
        self.queue.borrow().frames.len()
    }
}

impl Default for ManualPlatform {
    fn default() -> Self {
        ManualPlatform::new()
    }
}

impl Platform for ManualPlatform {
    fn set_interval(&self, period: f64, callback: Callback) -> TimerId {
        self.queue.borrow_mut().add_interval(period, callback)
    }

    fn clear_interval(&self, id: TimerId) {
        self.queue.borrow_mut().intervals.remove(&id);
    }

    fn request_frame(&self, callback: FrameCallback) -> FrameId {
        self.queue.borrow_mut().add_frame(callback)
    }

    fn cancel_frame(&self, id: FrameId) {
        self.queue.borrow_mut().cancel_frame(id);
    }

    fn now(&self) -> f64 {
        self.queue.borrow().now
    }
}

/// A platform following the wall clock.
pub struct RealtimePlatform {
    queue: RefCell<Queue>,
    /// The clock reading at creation, in nanoseconds.
    origin: u64,
    frame_period: f64,
    next_frame: Cell<f64>,
}

impl RealtimePlatform {
    /// Returns a platform presenting a frame every `frame_period`
    /// milliseconds.
    pub fn new(frame_period: f64) -> Self {
        RealtimePlatform {
            queue: RefCell::new(Queue::new(MIN_NATIVE_PERIOD, false)),
            origin: time::precise_time_ns(),
            frame_period,
            next_frame: Cell::new(frame_period),
        }
    }

    /// Runs timers and frames for `ms` milliseconds of wall-clock time.
    pub fn run_for(&self, ms: f64) {
        let end = self.now() + ms;
        loop {
            let now = self.now();
            if now >= end {
                break;
            }
            self.queue.borrow_mut().now = now;
            dispatch_due(&self.queue, now);
            if now >= self.next_frame.get() {
                dispatch_frame(&self.queue);
                self.next_frame.set(now + self.frame_period);
            }

            let next_tick = self.queue.borrow().next_due().map(|(_, due)| due);
            let wake = next_tick
                .unwrap_or(end)
                .min(self.next_frame.get())
                .min(end);
            let now = self.now();
            if wake > now {
                thread::sleep(Duration::from_micros(((wake - now) * 1000.0) as u64));
            }
        }
    }
}

impl Default for RealtimePlatform {
    fn default() -> Self {
        RealtimePlatform::new(DEFAULT_FRAME_PERIOD)
    }
}

impl Platform for RealtimePlatform {
    fn set_interval(&self, period: f64, callback: Callback) -> TimerId {
        let now = self.now();
        let mut queue = self.queue.borrow_mut();
        if now > queue.now {
            queue.now = now;
        }
        queue.add_interval(period, callback)
    }

    fn clear_interval(&self, id: TimerId) {
        self.queue.borrow_mut().intervals.remove(&id);
    }

    fn request_frame(&self, callback: FrameCallback) -> FrameId {
        self.queue.borrow_mut().add_frame(callback)
    }

    fn cancel_frame(&self, id: FrameId) {
        self.queue.borrow_mut().cancel_frame(id);
    }

    fn now(&self) -> f64 {
        (time::precise_time_ns() - self.origin) as f64 / 1e6
    }
}
