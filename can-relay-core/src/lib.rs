//! CAN Relay Core Library
//!
//! Forwards frames from one CAN bus to another, unmodified and in order, for a
//! bounded or unbounded duration.
//!
//! # Architecture
//!
//! - [`CanBus`] is a handle on one open interface: receive with timeout,
//!   best-effort send, idempotent close.
//! - [`BusFactory`] opens handles by interface identifier; [`InterfaceFactory`]
//!   covers the built-in transports (SocketCAN, in-process virtual bus).
//! - [`RelayEngine`] runs one session: opens source then target, relays until
//!   the deadline, a [`CancelToken`] or a bus failure stops it, and releases
//!   both buses before returning a [`RelayReport`].
//!
//! The library does NOT:
//! - Filter or rewrite frames
//! - Record relayed traffic
//! - Install signal handlers (the caller raises the [`CancelToken`])
//!
//! # Example Usage
//!
//! ```no_run
//! use can_relay_core::{CancelToken, InterfaceFactory, RelayConfig, RelayEngine, RelayRequest};
//!
//! let config = RelayConfig::new().with_max_consecutive_send_failures(5);
//! let engine = RelayEngine::new(config.clone()).unwrap();
//! let factory = InterfaceFactory::new(&config);
//!
//! let request = RelayRequest::new("can0", "virtual:mirror")
//!     .with_duration_secs(30.0)
//!     .unwrap();
//! let cancel = CancelToken::new();
//!
//! let report = engine.run(&factory, &request, &cancel);
//! println!("{} after {:.1}s", report.status, report.running_secs());
//! ```

// Public modules
pub mod bus;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use bus::{BusFactory, CanBus};
pub use cancel::CancelToken;
pub use config::{RelayConfig, RelayRequest};
pub use engine::{RelayEngine, RelayState};
pub use transport::{InterfaceFactory, InterfaceSpec, VirtualBus};
pub use types::{
    BusError, BusResult, CanFrame, RelayError, RelayReport, RelayStatus, Result, Timestamp,
};

// Internal modules (not exposed in public API)
mod session;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
