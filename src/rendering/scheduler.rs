//! Display-refresh and timer scheduling for single-threaded renderers.
//!
//! Renderers never block. A draw or fade step is requested on a [`FrameSlot`]
//! and runs on the next `tick` the host delivers at display refresh. A
//! [`Deferred`] holds a timer that fires once its deadline has passed.

use crate::prelude::{Duration, Instant};

/// Handle to a requested frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Holds at most one pending display-refresh callback.
///
/// Requesting a new frame while one is pending cancels the stale request;
/// only the most recent payload ever runs.
#[derive(Debug)]
pub struct FrameSlot<T> {
    pending: Option<(FrameHandle, T)>,
    next_id: u64,
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self {
            pending: None,
            next_id: 1,
        }
    }

    /// Schedule `payload` for the next frame, replacing any pending request
    pub fn request(&mut self, payload: T) -> FrameHandle {
        let handle = FrameHandle(self.next_id);
        self.next_id += 1;
        if let Some((_stale, _)) = self.pending.replace((handle, payload)) {
            #[cfg(feature = "debug")]
            log::debug!("frame {:?} superseded by {:?}", _stale, handle);
        }
        handle
    }

    /// Cancel the pending request, if any
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Cancel only if `handle` is still the pending request
    pub fn cancel_handle(&mut self, handle: FrameHandle) -> bool {
        match &self.pending {
            Some((pending, _)) if *pending == handle => self.cancel(),
            _ => false,
        }
    }

    /// Take the payload due on this frame
    pub fn take(&mut self) -> Option<T> {
        self.pending.take().map(|(_, payload)| payload)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_handle(&self) -> Option<FrameHandle> {
        self.pending.as_ref().map(|(handle, _)| *handle)
    }
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A one-shot cancellable timer
#[derive(Debug)]
pub struct Deferred<T> {
    pending: Option<(Instant, T)>,
}

impl<T> Deferred<T> {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Arm the timer, replacing any previously armed one
    pub fn schedule(&mut self, now: Instant, delay: Duration, payload: T) {
        self.pending = Some((now + delay, payload));
    }

    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Take the payload if its deadline has passed
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((due, _)) if now >= *due => self.pending.take().map(|(_, payload)| payload),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(due, _)| *due)
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}
