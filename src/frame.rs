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

//! Self-rescheduling frame callbacks.

use std::cell::Cell;
use std::rc::Rc;

use platform::{FrameId, Platform};

/// The revocable continuation shared by a chain and its pending frame.
#[derive(Debug, Default)]
struct Token {
    revoked: Cell<bool>,
    pending: Cell<Option<FrameId>>,
}

/// A callback that runs once per frame, requesting the next frame from
/// within the current one.
///
/// At most one frame is pending at any time: the next frame is only
/// requested after the body has returned.
#[derive(Debug)]
pub struct FrameChain {
    token: Rc<Token>,
}

impl FrameChain {
    /// Starts a chain running `body` on every frame until the chain is
    /// cancelled or `body` returns `false`.
    pub fn start<P, F>(platform: &Rc<P>, body: F) -> FrameChain
    where
        P: Platform + 'static,
        F: FnMut() -> bool + 'static,
    {
        let token = Rc::new(Token::default());
        schedule(platform.clone(), token.clone(), body);
        FrameChain { token }
    }

    /// Stops the chain, withdrawing its pending frame.  Cancelling twice does
    /// nothing.
    pub fn cancel<P: Platform + ?Sized>(&self, platform: &P) {
        self.token.revoked.set(true);
        if let Some(id) = self.token.pending.take() {
            platform.cancel_frame(id);
        }
    }

    /// Returns whether the chain will run again.
    pub fn is_active(&self) -> bool {
        !self.token.revoked.get() && self.token.pending.get().is_some()
    }

    /// Returns the id of the pending frame, if any.
    pub fn pending(&self) -> Option<FrameId> {
        self.token.pending.get()
    }
}

fn schedule<P, F>(platform: Rc<P>, token: Rc<Token>, mut body: F)
where
    P: Platform + 'static,
    F: FnMut() -> bool + 'static,
{
    let (p, t) = (platform.clone(), token.clone());
    let id = platform.request_frame(Box::new(move || {
        t.pending.set(None);
        if t.revoked.get() {
            return;
        }
        if body() && !t.revoked.get() {
            schedule(p, t, body);
        } else {
            trace!("frame chain ended");
        }
    }));
    token.pending.set(Some(id));
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use platform::ManualPlatform;

    use super::*;

    #[test]
    fn runs_once_per_frame() {
        let platform = Rc::new(ManualPlatform::new());
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let chain = FrameChain::start(&platform, move || {
            c.set(c.get() + 1);
            true
        });

        for expected in 1..5 {
            assert_eq!(platform.fire_frame(), 1);
            assert_eq!(count.get(), expected);
            assert_eq!(platform.pending_frames(), 1);
        }
        assert!(chain.is_active());
    }

    #[test]
    fn cancel_withdraws_the_pending_frame() {
        let platform = Rc::new(ManualPlatform::new());
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let chain = FrameChain::start(&platform, move || {
            c.set(c.get() + 1);
            true
        });

        platform.fire_frame();
        chain.cancel(&*platform);
        chain.cancel(&*platform);
        assert!(!chain.is_active());
        assert_eq!(platform.pending_frames(), 0);
        platform.fire_frame();
        assert_eq!(count.get(), 1);
    }

    /// Cancelling from inside the body stops the chain from re-arming.
    #[test]
    fn cancel_from_inside_the_body() {
        let platform = Rc::new(ManualPlatform::new());
        let slot: Rc<Cell<Option<Rc<Token>>>> = Rc::new(Cell::new(None));
        let s = slot.clone();
        let chain = FrameChain::start(&platform, move || {
            if let Some(token) = s.take() {
                token.revoked.set(true);
            }
            true
        });
        slot.set(Some(chain.token.clone()));

        assert_eq!(platform.fire_frame(), 1);
        assert_eq!(platform.pending_frames(), 0);
        assert!(!chain.is_active());
    }

    #[test]
    fn body_can_end_the_chain() {
        let platform = Rc::new(ManualPlatform::new());
        let chain = FrameChain::start(&platform, || false);
        platform.fire_frame();
        assert!(!chain.is_active());
        assert_eq!(platform.pending_frames(), 0);
    }
}
