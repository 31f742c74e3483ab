//! Relay engine
//!
//! Drives one relay session through `Starting -> Running -> Stopping -> Stopped`:
//! opens the source then the target bus, forwards every frame read from the
//! source to the target in arrival order, and stops on deadline, cancellation or
//! bus failure. Both buses are released before the report is returned, whatever
//! the exit path.

use crate::bus::{BusFactory, CanBus};
use crate::cancel::CancelToken;
use crate::config::{RelayConfig, RelayRequest};
use crate::session::{BusGuard, RelaySession};
use crate::types::{RelayReport, RelayStatus, Result, Timestamp};
use chrono::Utc;
use std::fmt;
use std::time::Duration;

/// Lifecycle of a relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Opening the buses
    Starting,
    /// Forwarding frames
    Running,
    /// Releasing the buses
    Stopping,
    /// Terminal; the report is ready
    Stopped,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::Starting => write!(f, "Starting"),
            RelayState::Running => write!(f, "Running"),
            RelayState::Stopping => write!(f, "Stopping"),
            RelayState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Counters accumulated while running
#[derive(Debug, Default)]
struct RelayStats {
    frames_received: u64,
    frames_forwarded: u64,
    frames_dropped: u64,
    last_error: Option<String>,
}

/// One-directional frame relay between two buses
#[derive(Debug, Clone)]
pub struct RelayEngine {
    config: RelayConfig,
}

impl RelayEngine {
    /// Create an engine, rejecting configurations it cannot run with
    pub fn new(config: RelayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Engine configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Run one relay session to completion.
    ///
    /// Blocks the calling thread until the duration elapses, `cancel` is
    /// raised, or a bus fails. The returned report is produced after both
    /// buses have been closed.
    ///
    /// # Example
    /// ```no_run
    /// use can_relay_core::{CancelToken, InterfaceFactory, RelayConfig, RelayEngine, RelayRequest};
    ///
    /// let config = RelayConfig::new();
    /// let engine = RelayEngine::new(config.clone()).unwrap();
    /// let factory = InterfaceFactory::new(&config);
    /// let request = RelayRequest::new("can0", "can1").with_duration_secs(10.0).unwrap();
    ///
    /// let report = engine.run(&factory, &request, &CancelToken::new());
    /// println!("{}: {} frames forwarded", report.status, report.frames_forwarded);
    /// ```
    pub fn run<F: BusFactory>(
        &self,
        factory: &F,
        request: &RelayRequest,
        cancel: &CancelToken,
    ) -> RelayReport {
        let started_at = Utc::now();
        let mut stats = RelayStats::default();
        log_transition(RelayState::Starting);

        let source = match factory.open(&request.source) {
            Ok(bus) => BusGuard::new(bus, "source"),
            Err(e) => {
                log::error!("Cannot open source interface {}: {}", request.source, e);
                stats.last_error = Some(e.to_string());
                log_transition(RelayState::Stopped);
                return finish(
                    request,
                    RelayStatus::InterfaceUnavailable,
                    stats,
                    started_at,
                    Duration::ZERO,
                );
            }
        };
        log::debug!("Opened source interface {}", request.source);

        let target = match factory.open(&request.target) {
            Ok(bus) => BusGuard::new(bus, "target"),
            Err(e) => {
                log::error!("Cannot open target interface {}: {}", request.target, e);
                stats.last_error = Some(e.to_string());
                drop(source);
                log_transition(RelayState::Stopped);
                return finish(
                    request,
                    RelayStatus::InterfaceUnavailable,
                    stats,
                    started_at,
                    Duration::ZERO,
                );
            }
        };
        log::debug!("Opened target interface {}", request.target);

        let mut session = RelaySession::begin(source, target, request.duration);
        log_transition(RelayState::Running);

        let status = self.relay(&mut session, cancel, &mut stats);
        let running_time = session.elapsed();

        log_transition(RelayState::Stopping);
        session.teardown();
        drop(session);
        log_transition(RelayState::Stopped);

        finish(request, status, stats, started_at, running_time)
    }

    /// The running phase. Returns the reason it ended.
    fn relay<S: CanBus, T: CanBus>(
        &self,
        session: &mut RelaySession<S, T>,
        cancel: &CancelToken,
        stats: &mut RelayStats,
    ) -> RelayStatus {
        let poll = self.config.poll_timeout();
        let threshold = self.config.max_consecutive_send_failures;
        let mut consecutive_failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                log::info!("Cancellation requested");
                return RelayStatus::CancelledByUser;
            }

            let wait = match session.time_left() {
                Some(left) if left.is_zero() => return RelayStatus::CompletedDuration,
                Some(left) => left.min(poll),
                None => poll,
            };

            let frame = match session.source().receive(wait) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    log::error!("Source bus failed: {}", e);
                    stats.last_error = Some(e.to_string());
                    return RelayStatus::SourceUnreachable;
                }
            };
            stats.frames_received += 1;
            log::trace!("rx {}", frame);

            match session.target().send(&frame) {
                Ok(()) => {
                    stats.frames_forwarded += 1;
                    consecutive_failures = 0;
                }
                Err(e) => {
                    stats.frames_dropped += 1;
                    consecutive_failures += 1;
                    log::warn!(
                        "Dropped frame {} ({}/{} consecutive send failures): {}",
                        frame,
                        consecutive_failures,
                        threshold,
                        e
                    );
                    stats.last_error = Some(e.to_string());

                    if consecutive_failures >= threshold {
                        log::error!(
                            "Target bus refused {} frames in a row, giving up",
                            consecutive_failures
                        );
                        return RelayStatus::TargetUnreachable;
                    }
                }
            }
        }
    }
}

fn log_transition(state: RelayState) {
    log::debug!("Relay state -> {}", state);
}

fn finish(
    request: &RelayRequest,
    status: RelayStatus,
    stats: RelayStats,
    started_at: Timestamp,
    running_time: Duration,
) -> RelayReport {
    log::info!(
        "Relay {} -> {} stopped: {} ({} forwarded, {} dropped)",
        request.source,
        request.target,
        status,
        stats.frames_forwarded,
        stats.frames_dropped
    );

    RelayReport {
        status,
        source: request.source.clone(),
        target: request.target.clone(),
        frames_received: stats.frames_received,
        frames_forwarded: stats.frames_forwarded,
        frames_dropped: stats.frames_dropped,
        started_at,
        finished_at: Utc::now(),
        running_time,
        last_error: stats.last_error,
    }
}
