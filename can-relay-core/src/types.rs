//! Core types for the CAN relay library
//!
//! This module defines the frame that travels between buses, the terminal
//! statuses a relay session can end with, the report handed back to the caller,
//! and the error types used throughout the crate.

use chrono::{DateTime, Utc};
use embedded_can::{ExtendedId, Id, StandardId};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Timestamp type used in relay reports
pub type Timestamp = DateTime<Utc>;

/// Result type for request and configuration validation
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type for bus operations
pub type BusResult<T> = std::result::Result<T, BusError>;

/// Highest 11-bit identifier
pub const MAX_STANDARD_ID: u32 = 0x7FF;
/// Highest 29-bit identifier
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;
/// Payload limit for classic CAN frames
pub const CLASSIC_MAX_DLEN: usize = 8;
/// Payload limit for CAN FD frames
pub const FD_MAX_DLEN: usize = 64;

/// One CAN message as seen on a bus.
///
/// The relay never looks inside a frame; it only moves it. Transports convert
/// their native frame type into this one on receive and back on send, so every
/// flag a transport can express must survive the round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CanFrame {
    /// CAN message ID (11-bit or 29-bit)
    pub can_id: u32,
    /// True if this is an extended (29-bit) CAN ID
    pub is_extended: bool,
    /// True if this is a remote transmission request
    pub is_remote_frame: bool,
    /// True if this is a CAN FD frame
    pub is_fd: bool,
    /// CAN FD bit rate switch flag
    pub bitrate_switch: bool,
    /// CAN FD error state indicator flag
    pub error_state_indicator: bool,
    /// Data length: payload length for data frames, requested length for remote frames
    pub dlc: usize,
    /// Frame data bytes (0-8 bytes for classic CAN, up to 64 for CAN FD)
    pub data: Vec<u8>,
}

impl CanFrame {
    /// Build a classic CAN data frame
    pub fn new_data(id: impl Into<Id>, data: &[u8]) -> BusResult<Self> {
        let (can_id, is_extended) = split_id(id.into());
        let frame = Self {
            can_id,
            is_extended,
            is_remote_frame: false,
            is_fd: false,
            bitrate_switch: false,
            error_state_indicator: false,
            dlc: data.len(),
            data: data.to_vec(),
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Build a classic CAN remote frame requesting `dlc` bytes
    pub fn new_remote(id: impl Into<Id>, dlc: usize) -> BusResult<Self> {
        let (can_id, is_extended) = split_id(id.into());
        let frame = Self {
            can_id,
            is_extended,
            is_remote_frame: true,
            is_fd: false,
            bitrate_switch: false,
            error_state_indicator: false,
            dlc,
            data: Vec::new(),
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Build a CAN FD data frame
    pub fn new_fd(id: impl Into<Id>, data: &[u8], bitrate_switch: bool) -> BusResult<Self> {
        let (can_id, is_extended) = split_id(id.into());
        let frame = Self {
            can_id,
            is_extended,
            is_remote_frame: false,
            is_fd: true,
            bitrate_switch,
            error_state_indicator: false,
            dlc: data.len(),
            data: data.to_vec(),
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Builder method: set the CAN FD error state indicator
    pub fn with_error_state_indicator(mut self, esi: bool) -> Self {
        self.error_state_indicator = esi;
        self
    }

    /// Check identifier width, payload length and flag combinations
    pub fn validate(&self) -> BusResult<()> {
        let max_id = if self.is_extended {
            MAX_EXTENDED_ID
        } else {
            MAX_STANDARD_ID
        };
        if self.can_id > max_id {
            return Err(BusError::InvalidFrame(format!(
                "identifier 0x{:X} exceeds 0x{:X}",
                self.can_id, max_id
            )));
        }

        if self.is_remote_frame {
            if self.is_fd {
                return Err(BusError::InvalidFrame(
                    "CAN FD has no remote frames".to_string(),
                ));
            }
            if !self.data.is_empty() || self.dlc > CLASSIC_MAX_DLEN {
                return Err(BusError::InvalidFrame(format!(
                    "remote frame with dlc {} and {} data bytes",
                    self.dlc,
                    self.data.len()
                )));
            }
            return Ok(());
        }

        if self.dlc != self.data.len() {
            return Err(BusError::InvalidFrame(format!(
                "dlc {} does not match {} data bytes",
                self.dlc,
                self.data.len()
            )));
        }

        if self.is_fd {
            if !is_valid_fd_len(self.data.len()) {
                return Err(BusError::InvalidFrame(format!(
                    "{} is not a valid CAN FD payload length",
                    self.data.len()
                )));
            }
        } else {
            if self.data.len() > CLASSIC_MAX_DLEN {
                return Err(BusError::InvalidFrame(format!(
                    "{} data bytes in a classic CAN frame",
                    self.data.len()
                )));
            }
            if self.bitrate_switch || self.error_state_indicator {
                return Err(BusError::InvalidFrame(
                    "BRS/ESI flags set on a classic CAN frame".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Identifier as an `embedded_can::Id`
    pub fn id(&self) -> Id {
        if self.is_extended {
            Id::Extended(ExtendedId::new(self.can_id).unwrap_or(ExtendedId::ZERO))
        } else {
            let raw = u16::try_from(self.can_id).unwrap_or(u16::MAX);
            Id::Standard(StandardId::new(raw).unwrap_or(StandardId::ZERO))
        }
    }

    /// Convert any `embedded_can::Frame` into a classic `CanFrame`
    pub fn from_embedded<F: embedded_can::Frame>(frame: &F) -> BusResult<Self> {
        if frame.is_remote_frame() {
            Self::new_remote(frame.id(), frame.dlc())
        } else {
            Self::new_data(frame.id(), frame.data())
        }
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Self::new_data(id, data).ok()
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        CanFrame::new_remote(id, dlc).ok()
    }

    fn is_extended(&self) -> bool {
        self.is_extended
    }

    fn is_remote_frame(&self) -> bool {
        self.is_remote_frame
    }

    fn id(&self) -> Id {
        CanFrame::id(self)
    }

    fn dlc(&self) -> usize {
        self.dlc
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// candump-style rendering, e.g. `123#DEADBEEF`, `1ABCDEF0#R2`, `321##1AA`
impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended {
            write!(f, "{:08X}", self.can_id)?;
        } else {
            write!(f, "{:03X}", self.can_id)?;
        }

        if self.is_remote_frame {
            return write!(f, "#R{}", self.dlc);
        }

        if self.is_fd {
            let flags = u8::from(self.bitrate_switch) | (u8::from(self.error_state_indicator) << 1);
            write!(f, "##{:X}", flags)?;
        } else {
            write!(f, "#")?;
        }

        for byte in &self.data {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

fn split_id(id: Id) -> (u32, bool) {
    match id {
        Id::Standard(id) => (u32::from(id.as_raw()), false),
        Id::Extended(id) => (id.as_raw(), true),
    }
}

fn is_valid_fd_len(len: usize) -> bool {
    matches!(len, 0..=8 | 12 | 16 | 20 | 24 | 32 | 48 | 64)
}

/// Terminal status of a relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelayStatus {
    /// The configured duration elapsed
    CompletedDuration,
    /// The cancellation signal was raised
    CancelledByUser,
    /// The source bus failed while relaying
    SourceUnreachable,
    /// The target bus refused too many consecutive frames
    TargetUnreachable,
    /// A bus could not be opened; nothing was relayed
    InterfaceUnavailable,
}

impl RelayStatus {
    /// True for the statuses caused by a bus failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RelayStatus::SourceUnreachable
                | RelayStatus::TargetUnreachable
                | RelayStatus::InterfaceUnavailable
        )
    }
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayStatus::CompletedDuration => write!(f, "CompletedDuration"),
            RelayStatus::CancelledByUser => write!(f, "CancelledByUser"),
            RelayStatus::SourceUnreachable => write!(f, "SourceUnreachable"),
            RelayStatus::TargetUnreachable => write!(f, "TargetUnreachable"),
            RelayStatus::InterfaceUnavailable => write!(f, "InterfaceUnavailable"),
        }
    }
}

/// Outcome of one relay session, produced after both buses are released
#[derive(Debug, Clone, Serialize)]
pub struct RelayReport {
    /// Why the session ended
    pub status: RelayStatus,
    /// Source interface identifier
    pub source: String,
    /// Target interface identifier
    pub target: String,
    /// Frames taken off the source bus
    pub frames_received: u64,
    /// Frames accepted by the target bus
    pub frames_forwarded: u64,
    /// Frames dropped because the target refused them
    pub frames_dropped: u64,
    /// Wall-clock time the session started
    pub started_at: Timestamp,
    /// Wall-clock time the session ended
    pub finished_at: Timestamp,
    /// Time spent in the running phase
    pub running_time: Duration,
    /// Last bus error that contributed to the status, if any
    pub last_error: Option<String>,
}

impl RelayReport {
    /// Running time in fractional seconds
    pub fn running_secs(&self) -> f64 {
        self.running_time.as_secs_f64()
    }
}

/// Errors raised by bus handles and transports
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Interface unavailable: {interface}: {reason}")]
    InterfaceUnavailable { interface: String, reason: String },

    #[error("Invalid interface identifier: {0:?}")]
    InvalidInterface(String),

    #[error("Send failed on {interface}: {reason}")]
    SendFailure { interface: String, reason: String },

    #[error("Receive failed on {interface}: {reason}")]
    ReceiveFailure { interface: String, reason: String },

    #[error("Interface closed: {0}")]
    Closed(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while validating a relay request or configuration
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid duration: {0} (must be a finite, non-negative number of seconds)")]
    InvalidDuration(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
