//! Bus transports (SocketCAN, virtual)
//!
//! Interface identifiers pick a transport by prefix:
//! - `virtual:<channel>` joins an in-process virtual channel
//! - `socketcan:<iface>` opens a classic SocketCAN socket
//! - `socketcanfd:<iface>` opens a CAN FD capable SocketCAN socket
//! - a bare name such as `can0` is treated as `socketcan:can0`

use crate::bus::{BusFactory, CanBus};
use crate::config::RelayConfig;
use crate::types::{BusError, BusResult};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub mod virtual_bus;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socket_can;

pub use virtual_bus::VirtualBus;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use socket_can::SocketCanBus;

const SOCKETCAN_PREFIX: &str = "socketcan";
const SOCKETCAN_FD_PREFIX: &str = "socketcanfd";

/// Parsed interface identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceSpec {
    /// In-process virtual channel
    Virtual(String),
    /// Kernel SocketCAN interface
    SocketCan {
        /// Network interface name, e.g. `can0`
        iface: String,
        /// Open the socket with CAN FD frames enabled
        fd: bool,
    },
}

impl FromStr for InterfaceSpec {
    type Err = BusError;

    fn from_str(s: &str) -> BusResult<Self> {
        let invalid = || BusError::InvalidInterface(s.to_string());
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let (prefix, name) = match trimmed.split_once(':') {
            Some((prefix, name)) => (Some(prefix), name),
            None => (None, trimmed),
        };
        if name.is_empty() {
            return Err(invalid());
        }

        match prefix {
            None | Some(SOCKETCAN_PREFIX) => Ok(InterfaceSpec::SocketCan {
                iface: name.to_string(),
                fd: false,
            }),
            Some(SOCKETCAN_FD_PREFIX) => Ok(InterfaceSpec::SocketCan {
                iface: name.to_string(),
                fd: true,
            }),
            Some(virtual_bus::PREFIX) => Ok(InterfaceSpec::Virtual(name.to_string())),
            Some(_) => Err(invalid()),
        }
    }
}

impl fmt::Display for InterfaceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceSpec::Virtual(channel) => write!(f, "{}:{}", virtual_bus::PREFIX, channel),
            InterfaceSpec::SocketCan { iface, fd: false } => write!(f, "{}", iface),
            InterfaceSpec::SocketCan { iface, fd: true } => {
                write!(f, "{}:{}", SOCKETCAN_FD_PREFIX, iface)
            }
        }
    }
}

/// Opens any built-in transport from its interface identifier
#[derive(Debug, Clone)]
pub struct InterfaceFactory {
    send_timeout: Duration,
    virtual_queue_capacity: usize,
}

impl InterfaceFactory {
    /// Create a factory using the transport settings of `config`
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            send_timeout: config.send_timeout(),
            virtual_queue_capacity: config.virtual_queue_capacity,
        }
    }

    #[cfg(all(target_os = "linux", feature = "socketcan"))]
    fn open_socketcan(&self, iface: &str, fd: bool) -> BusResult<Box<dyn CanBus + Send>> {
        Ok(Box::new(SocketCanBus::open(iface, fd, self.send_timeout)?))
    }

    #[cfg(not(all(target_os = "linux", feature = "socketcan")))]
    fn open_socketcan(&self, iface: &str, _fd: bool) -> BusResult<Box<dyn CanBus + Send>> {
        Err(BusError::InterfaceUnavailable {
            interface: iface.to_string(),
            reason: "SocketCAN support is not available on this build".to_string(),
        })
    }
}

impl BusFactory for InterfaceFactory {
    type Bus = Box<dyn CanBus + Send>;

    fn open(&self, interface: &str) -> BusResult<Self::Bus> {
        match interface.parse::<InterfaceSpec>()? {
            InterfaceSpec::Virtual(channel) => Ok(Box::new(VirtualBus::open(
                &channel,
                self.virtual_queue_capacity,
            )?)),
            InterfaceSpec::SocketCan { iface, fd } => self.open_socketcan(&iface, fd),
        }
    }
}
