//! Linux SocketCAN transport
//!
//! Wraps the [`socketcan`] crate's raw sockets. Classic sockets carry data and
//! remote frames; FD sockets additionally carry CAN FD frames. Receives use the
//! socket read timeout, sends use a bounded write timeout so a saturated
//! transmit queue surfaces as a send failure instead of stalling the relay.

use crate::bus::CanBus;
use crate::types::{BusError, BusResult, CanFrame};
use ::socketcan::{
    CanAnyFrame, CanDataFrame, CanFdFrame, CanFdSocket, CanFrame as SocketFrame,
    CanRemoteFrame, CanSocket, Socket,
};
use embedded_can::Frame as EmbeddedFrame;
use std::io;
use std::time::Duration;

const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

enum SocketKind {
    Classic(CanSocket),
    Fd(CanFdSocket),
}

/// One open SocketCAN interface
pub struct SocketCanBus {
    interface: String,
    socket: Option<SocketKind>,
}

impl SocketCanBus {
    /// Open `iface` (e.g. `"can0"`, `"vcan0"`). `fd` enables CAN FD frames.
    pub fn open(iface: &str, fd: bool, send_timeout: Duration) -> BusResult<Self> {
        let interface = if fd {
            format!("{}:{}", super::SOCKETCAN_FD_PREFIX, iface)
        } else {
            iface.to_string()
        };
        let unavailable = |e: io::Error| BusError::InterfaceUnavailable {
            interface: interface.clone(),
            reason: e.to_string(),
        };

        let socket = if fd {
            let socket = CanFdSocket::open(iface).map_err(unavailable)?;
            socket
                .set_write_timeout(Some(send_timeout))
                .map_err(unavailable)?;
            SocketKind::Fd(socket)
        } else {
            let socket = CanSocket::open(iface).map_err(unavailable)?;
            socket
                .set_write_timeout(Some(send_timeout))
                .map_err(unavailable)?;
            SocketKind::Classic(socket)
        };

        log::debug!("Opened SocketCAN interface {} (fd: {})", iface, fd);
        Ok(Self {
            interface,
            socket: Some(socket),
        })
    }

    fn receive_failure(&self, e: io::Error) -> BusError {
        BusError::ReceiveFailure {
            interface: self.interface.clone(),
            reason: e.to_string(),
        }
    }

    fn send_failure(&self, reason: impl Into<String>) -> BusError {
        BusError::SendFailure {
            interface: self.interface.clone(),
            reason: reason.into(),
        }
    }
}

fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

fn from_classic(frame: SocketFrame) -> BusResult<Option<CanFrame>> {
    match frame {
        SocketFrame::Data(frame) => CanFrame::from_embedded(&frame).map(Some),
        SocketFrame::Remote(frame) => CanFrame::from_embedded(&frame).map(Some),
        SocketFrame::Error(_) => {
            log::debug!("Ignoring error frame");
            Ok(None)
        }
    }
}

fn from_any(frame: CanAnyFrame) -> BusResult<Option<CanFrame>> {
    match frame {
        CanAnyFrame::Normal(frame) => CanFrame::from_embedded(&frame).map(Some),
        CanAnyFrame::Remote(frame) => CanFrame::from_embedded(&frame).map(Some),
        CanAnyFrame::Fd(frame) => {
            let converted = CanFrame::new_fd(
                EmbeddedFrame::id(&frame),
                EmbeddedFrame::data(&frame),
                frame.is_brs(),
            )?;
            Ok(Some(converted.with_error_state_indicator(frame.is_esi())))
        }
        CanAnyFrame::Error(_) => {
            log::debug!("Ignoring error frame");
            Ok(None)
        }
    }
}

fn to_classic(frame: &CanFrame) -> Option<SocketFrame> {
    if frame.is_fd {
        return None;
    }
    if frame.is_remote_frame {
        <SocketFrame as EmbeddedFrame>::new_remote(frame.id(), frame.dlc)
    } else {
        <SocketFrame as EmbeddedFrame>::new(frame.id(), &frame.data)
    }
}

fn to_any(frame: &CanFrame) -> Option<CanAnyFrame> {
    if frame.is_fd {
        let mut fd = <CanFdFrame as EmbeddedFrame>::new(frame.id(), &frame.data)?;
        fd.set_brs(frame.bitrate_switch);
        fd.set_esi(frame.error_state_indicator);
        Some(CanAnyFrame::Fd(fd))
    } else if frame.is_remote_frame {
        <CanRemoteFrame as EmbeddedFrame>::new_remote(frame.id(), frame.dlc)
            .map(CanAnyFrame::Remote)
    } else {
        <CanDataFrame as EmbeddedFrame>::new(frame.id(), &frame.data).map(CanAnyFrame::Normal)
    }
}

impl CanBus for SocketCanBus {
    fn interface(&self) -> &str {
        &self.interface
    }

    fn receive(&mut self, timeout: Duration) -> BusResult<Option<CanFrame>> {
        let timeout = timeout.max(MIN_READ_TIMEOUT);
        let result = match &self.socket {
            Some(SocketKind::Classic(socket)) => {
                socket.read_frame_timeout(timeout).map(from_classic)
            }
            Some(SocketKind::Fd(socket)) => socket.read_frame_timeout(timeout).map(from_any),
            None => return Err(BusError::Closed(self.interface.clone())),
        };

        match result {
            Ok(frame) => frame,
            Err(e) if is_idle(&e) => Ok(None),
            Err(e) => Err(self.receive_failure(e)),
        }
    }

    fn send(&mut self, frame: &CanFrame) -> BusResult<()> {
        let result = match &self.socket {
            Some(SocketKind::Classic(socket)) => {
                let native = to_classic(frame).ok_or_else(|| {
                    self.send_failure(format!("{} does not fit a classic CAN socket", frame))
                })?;
                socket.write_frame(&native)
            }
            Some(SocketKind::Fd(socket)) => {
                let native = to_any(frame)
                    .ok_or_else(|| self.send_failure(format!("{} cannot be encoded", frame)))?;
                socket.write_frame(&native)
            }
            None => return Err(self.send_failure("interface closed")),
        };

        result.map_err(|e| self.send_failure(e.to_string()))
    }

    fn close(&mut self) -> BusResult<()> {
        if self.socket.take().is_some() {
            log::debug!("Closed SocketCAN interface {}", self.interface);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }
}
