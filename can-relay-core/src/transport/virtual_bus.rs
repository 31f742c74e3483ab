//! In-process virtual CAN bus
//!
//! Handles opened on the same channel name share one simulated wire: a frame
//! sent by one handle is delivered to every other handle on that channel, never
//! back to the sender. Each handle has a bounded receive queue; a peer whose
//! queue is full loses the frame (receive overrun) and the send still succeeds,
//! so a handle that never reads cannot block anyone else.

use crate::bus::CanBus;
use crate::types::{BusError, BusResult, CanFrame};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;

/// Identifier prefix selecting this transport
pub const PREFIX: &str = "virtual";

struct Peer {
    id: u64,
    tx: SyncSender<CanFrame>,
}

type Hub = HashMap<String, Vec<Peer>>;

static HUB: OnceLock<Mutex<Hub>> = OnceLock::new();
static NEXT_PEER_ID: AtomicU64 = AtomicU64::new(1);

fn hub() -> MutexGuard<'static, Hub> {
    HUB.get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Number of handles currently open on `channel`
pub fn peer_count(channel: &str) -> usize {
    hub().get(channel).map_or(0, Vec::len)
}

/// One handle on a virtual channel
#[derive(Debug)]
pub struct VirtualBus {
    interface: String,
    channel: String,
    id: u64,
    rx: Receiver<CanFrame>,
    open: bool,
}

impl VirtualBus {
    /// Join `channel` with a receive queue holding up to `capacity` frames
    pub fn open(channel: &str, capacity: usize) -> BusResult<Self> {
        let interface = format!("{}:{}", PREFIX, channel);
        if channel.is_empty() {
            return Err(BusError::InvalidInterface(interface));
        }
        if capacity == 0 {
            return Err(BusError::InterfaceUnavailable {
                interface,
                reason: "receive queue capacity must be at least 1".to_string(),
            });
        }

        let (tx, rx) = mpsc::sync_channel(capacity);
        let id = NEXT_PEER_ID.fetch_add(1, Ordering::Relaxed);
        hub()
            .entry(channel.to_string())
            .or_default()
            .push(Peer { id, tx });

        log::debug!("Joined virtual channel {:?} as peer {}", channel, id);
        Ok(Self {
            interface,
            channel: channel.to_string(),
            id,
            rx,
            open: true,
        })
    }

    /// Channel this handle is attached to
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl CanBus for VirtualBus {
    fn interface(&self) -> &str {
        &self.interface
    }

    fn receive(&mut self, timeout: Duration) -> BusResult<Option<CanFrame>> {
        if !self.open {
            return Err(BusError::Closed(self.interface.clone()));
        }

        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::ReceiveFailure {
                interface: self.interface.clone(),
                reason: "detached from virtual channel".to_string(),
            }),
        }
    }

    fn send(&mut self, frame: &CanFrame) -> BusResult<()> {
        if !self.open {
            return Err(BusError::SendFailure {
                interface: self.interface.clone(),
                reason: "interface closed".to_string(),
            });
        }

        let mut channels = hub();
        if let Some(peers) = channels.get_mut(&self.channel) {
            peers.retain(|peer| {
                if peer.id == self.id {
                    return true;
                }
                match peer.tx.try_send(frame.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        log::debug!(
                            "Virtual channel {:?}: peer {} queue full, frame {:#x} dropped",
                            self.channel,
                            peer.id,
                            frame.can_id
                        );
                        true
                    }
                    Err(TrySendError::Disconnected(_)) => false,
                }
            });
        }
        Ok(())
    }

    fn close(&mut self) -> BusResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        let mut channels = hub();
        if let Some(peers) = channels.get_mut(&self.channel) {
            peers.retain(|peer| peer.id != self.id);
            if peers.is_empty() {
                channels.remove(&self.channel);
            }
        }
        log::debug!("Left virtual channel {:?} (peer {})", self.channel, self.id);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for VirtualBus {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
