//! Scoped ownership of the buses taking part in one relay run
//!
//! A `BusGuard` closes its bus exactly once, either when asked to or when it is
//! dropped. `RelaySession` holds the target guard before the source guard, so
//! any exit path (return, `?`, panic unwinding) closes the target first and the
//! source second.

use crate::bus::CanBus;
use std::time::{Duration, Instant};

/// Owns one open bus and closes it exactly once.
pub(crate) struct BusGuard<B: CanBus> {
    bus: B,
    role: &'static str,
    released: bool,
}

impl<B: CanBus> BusGuard<B> {
    pub(crate) fn new(bus: B, role: &'static str) -> Self {
        Self {
            bus,
            role,
            released: false,
        }
    }

    pub(crate) fn bus(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Close the bus if it has not been closed yet. Failures are logged only.
    pub(crate) fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match self.bus.close() {
            Ok(()) => log::debug!("Closed {} bus {}", self.role, self.bus.interface()),
            Err(e) => log::warn!(
                "Failed to close {} bus {}: {}",
                self.role,
                self.bus.interface(),
                e
            ),
        }
    }
}

impl<B: CanBus> Drop for BusGuard<B> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Source and target buses plus the deadline of one run.
pub(crate) struct RelaySession<S: CanBus, T: CanBus> {
    // Field order is drop order: target closes before source.
    target: BusGuard<T>,
    source: BusGuard<S>,
    started: Instant,
    deadline: Option<Instant>,
}

impl<S: CanBus, T: CanBus> RelaySession<S, T> {
    /// Start the clock. `duration = None` means no deadline.
    pub(crate) fn begin(
        source: BusGuard<S>,
        target: BusGuard<T>,
        duration: Option<Duration>,
    ) -> Self {
        let started = Instant::now();
        Self {
            target,
            source,
            started,
            deadline: duration.map(|d| started + d),
        }
    }

    pub(crate) fn source(&mut self) -> &mut S {
        self.source.bus()
    }

    pub(crate) fn target(&mut self) -> &mut T {
        self.target.bus()
    }

    /// Time left before the deadline. `None` when unbounded, `Some(ZERO)` once expired.
    pub(crate) fn time_left(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Close target then source; both are attempted regardless of failures.
    pub(crate) fn teardown(&mut self) {
        self.target.release();
        self.source.release();
    }
}
