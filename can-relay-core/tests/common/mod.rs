//! Scripted bus doubles shared by the integration tests

#![allow(dead_code)]

use can_relay_core::{BusError, BusFactory, BusResult, CanBus, CanFrame};
use embedded_can::{ExtendedId, StandardId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// One scripted outcome of `receive`
#[derive(Debug, Clone)]
pub enum Step {
    Frame(CanFrame),
    Idle,
    Fail,
}

/// How `send` behaves
#[derive(Debug, Clone)]
pub enum SendMode {
    Accept,
    Refuse,
    /// `true` = accept; once exhausted every send is accepted
    Pattern(VecDeque<bool>),
}

/// Observations recorded by a mock bus, readable after it has been moved into the engine
#[derive(Debug, Clone, Default)]
pub struct Probe {
    pub sent: Arc<Mutex<Vec<CanFrame>>>,
    pub closes: Arc<AtomicUsize>,
    pub receives: Arc<AtomicUsize>,
    pub close_order: Arc<Mutex<Vec<String>>>,
}

impl Probe {
    pub fn sent(&self) -> Vec<CanFrame> {
        self.sent.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn receives(&self) -> usize {
        self.receives.load(Ordering::SeqCst)
    }
}

pub struct MockBus {
    name: String,
    script: VecDeque<Step>,
    send_mode: SendMode,
    probe: Probe,
    open: bool,
}

impl MockBus {
    pub fn new(name: &str, probe: &Probe) -> Self {
        Self {
            name: name.to_string(),
            script: VecDeque::new(),
            send_mode: SendMode::Accept,
            probe: probe.clone(),
            open: true,
        }
    }

    pub fn with_script(mut self, script: impl IntoIterator<Item = Step>) -> Self {
        self.script = script.into_iter().collect();
        self
    }

    pub fn with_frames(self, frames: &[CanFrame]) -> Self {
        self.with_script(frames.iter().cloned().map(Step::Frame))
    }

    pub fn with_send_mode(mut self, mode: SendMode) -> Self {
        self.send_mode = mode;
        self
    }
}

impl CanBus for MockBus {
    fn interface(&self) -> &str {
        &self.name
    }

    fn receive(&mut self, timeout: Duration) -> BusResult<Option<CanFrame>> {
        self.probe.receives.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Step::Frame(frame)) => Ok(Some(frame)),
            Some(Step::Fail) => Err(BusError::ReceiveFailure {
                interface: self.name.clone(),
                reason: "bus-off".to_string(),
            }),
            Some(Step::Idle) | None => {
                thread::sleep(timeout);
                Ok(None)
            }
        }
    }

    fn send(&mut self, frame: &CanFrame) -> BusResult<()> {
        let accept = match &mut self.send_mode {
            SendMode::Accept => true,
            SendMode::Refuse => false,
            SendMode::Pattern(pattern) => pattern.pop_front().unwrap_or(true),
        };
        if !accept {
            return Err(BusError::SendFailure {
                interface: self.name.clone(),
                reason: "transmit queue full".to_string(),
            });
        }
        self.probe.sent.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn close(&mut self) -> BusResult<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.probe.close_order.lock().unwrap().push(self.name.clone());
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Hands out pre-built mock buses by name; unknown names fail to open
#[derive(Default)]
pub struct MockFactory {
    buses: Mutex<HashMap<String, MockBus>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bus(self, bus: MockBus) -> Self {
        self.buses
            .lock()
            .unwrap()
            .insert(bus.name.clone(), bus);
        self
    }

    pub fn unopened(&self) -> Vec<String> {
        self.buses.lock().unwrap().keys().cloned().collect()
    }
}

impl BusFactory for MockFactory {
    type Bus = MockBus;

    fn open(&self, interface: &str) -> BusResult<MockBus> {
        self.buses
            .lock()
            .unwrap()
            .remove(interface)
            .ok_or_else(|| BusError::InterfaceUnavailable {
                interface: interface.to_string(),
                reason: "no such device".to_string(),
            })
    }
}

pub fn std_frame(id: u16, data: &[u8]) -> CanFrame {
    CanFrame::new_data(StandardId::new(id).unwrap(), data).unwrap()
}

pub fn ext_frame(id: u32, data: &[u8]) -> CanFrame {
    CanFrame::new_data(ExtendedId::new(id).unwrap(), data).unwrap()
}

/// A mix of standard, extended, remote and FD frames
pub fn sample_frames(count: usize) -> Vec<CanFrame> {
    (0..count)
        .map(|i| {
            let byte = i as u8;
            match i % 4 {
                0 => std_frame(0x100 + (i as u16 % 0x600), &[byte, byte.wrapping_add(1)]),
                1 => ext_frame(0x18DA_F100 + i as u32, &[byte; 8]),
                2 => CanFrame::new_remote(StandardId::new(0x7DF).unwrap(), i % 9).unwrap(),
                _ => CanFrame::new_fd(StandardId::new(0x321).unwrap(), &[byte; 12], i % 2 == 0)
                    .unwrap()
                    .with_error_state_indicator(true),
            }
        })
        .collect()
}
