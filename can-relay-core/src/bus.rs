//! Bus handle abstraction
//!
//! The relay engine only ever talks to buses through these two traits, so the
//! transport behind a handle (SocketCAN, the in-process virtual bus, a test
//! double) can be swapped without touching the engine.

use crate::types::{BusResult, CanFrame};
use std::time::Duration;

/// One open connection to a CAN interface.
pub trait CanBus {
    /// Identifier the handle was opened with
    fn interface(&self) -> &str;

    /// Wait up to `timeout` for the next frame.
    ///
    /// `Ok(None)` means nothing arrived within the window. That is the normal
    /// outcome on an idle bus and is not an error.
    fn receive(&mut self, timeout: Duration) -> BusResult<Option<CanFrame>>;

    /// Put a frame on the bus without retrying.
    ///
    /// Implementations must return within a bounded time; a full transmit
    /// queue is reported as [`BusError::SendFailure`](crate::BusError::SendFailure).
    fn send(&mut self, frame: &CanFrame) -> BusResult<()>;

    /// Release the interface. Calling this again after success is a no-op.
    fn close(&mut self) -> BusResult<()>;

    /// Whether the handle still holds its interface
    fn is_open(&self) -> bool;
}

/// Opens bus handles by interface identifier.
pub trait BusFactory {
    /// Handle type produced by this factory
    type Bus: CanBus;

    /// Open the named interface, failing with
    /// [`BusError::InterfaceUnavailable`](crate::BusError::InterfaceUnavailable)
    /// when it cannot be claimed.
    fn open(&self, interface: &str) -> BusResult<Self::Bus>;
}

impl<B: CanBus + ?Sized> CanBus for Box<B> {
    fn interface(&self) -> &str {
        (**self).interface()
    }

    fn receive(&mut self, timeout: Duration) -> BusResult<Option<CanFrame>> {
        (**self).receive(timeout)
    }

    fn send(&mut self, frame: &CanFrame) -> BusResult<()> {
        (**self).send(frame)
    }

    fn close(&mut self) -> BusResult<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
