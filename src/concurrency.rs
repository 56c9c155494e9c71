//! Drain barrier for sync operations
//!
//! Pull and Push register themselves while running so a clean shutdown can
//! wait for outstanding sync work. This does not order or exclude operations.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

/// Registration of one running operation; dropping it deregisters.
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> InFlightGuard<'_> {
        *self.count.lock() += 1;
        InFlightGuard { owner: self }
    }

    pub fn current(&self) -> usize {
        *self.count.lock()
    }

    /// Block until no operation is registered. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count > 0 {
            if self.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut count = self.owner.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.owner.idle.notify_all();
        }
    }
}
