//! Relay summary output and exit codes

use anyhow::{Context, Result};
use can_relay_core::{RelayReport, RelayRequest, RelayStatus};
use std::fmt::Write;

pub const EXIT_OK: u8 = 0;
pub const EXIT_USAGE: u8 = 1;
pub const EXIT_INTERFACE_UNAVAILABLE: u8 = 2;
pub const EXIT_SOURCE_UNREACHABLE: u8 = 3;
pub const EXIT_TARGET_UNREACHABLE: u8 = 4;

/// Process exit code for a terminal status
pub fn exit_code(status: RelayStatus) -> u8 {
    match status {
        RelayStatus::CompletedDuration | RelayStatus::CancelledByUser => EXIT_OK,
        RelayStatus::InterfaceUnavailable => EXIT_INTERFACE_UNAVAILABLE,
        RelayStatus::SourceUnreachable => EXIT_SOURCE_UNREACHABLE,
        RelayStatus::TargetUnreachable => EXIT_TARGET_UNREACHABLE,
    }
}

/// One-line explanation shown to the operator
pub fn status_message(status: RelayStatus) -> &'static str {
    match status {
        RelayStatus::CompletedDuration => "Relay completed.",
        RelayStatus::CancelledByUser => "Proxying stopped by user.",
        RelayStatus::SourceUnreachable => "Source bus failed; nothing left to relay.",
        RelayStatus::TargetUnreachable => "Target bus kept refusing frames.",
        RelayStatus::InterfaceUnavailable => "Could not open a CAN interface.",
    }
}

/// Startup line printed before relaying begins
pub fn banner(request: &RelayRequest) -> String {
    match request.duration {
        Some(duration) => format!(
            "Proxying CAN traffic from {} to {} for {} seconds (press Ctrl+C to exit)",
            request.source,
            request.target,
            duration.as_secs_f64()
        ),
        None => format!(
            "Proxying CAN traffic from {} to {} until cancelled (press Ctrl+C to exit)",
            request.source, request.target
        ),
    }
}

/// Human-readable summary
pub fn render_summary(report: &RelayReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "═══════════════════════════════════════════════");
    let _ = writeln!(out, "  CAN Relay Summary");
    let _ = writeln!(out, "═══════════════════════════════════════════════");
    let _ = writeln!(out, "  Route:     {} -> {}", report.source, report.target);
    let _ = writeln!(out, "  Status:    {}", report.status);
    let _ = writeln!(out, "  Received:  {}", report.frames_received);
    let _ = writeln!(out, "  Forwarded: {}", report.frames_forwarded);
    let _ = writeln!(out, "  Dropped:   {}", report.frames_dropped);
    let _ = writeln!(out, "  Running:   {:.3}s", report.running_secs());
    let _ = writeln!(
        out,
        "  Finished:  {}",
        report.finished_at.format("%Y-%m-%d %H:%M:%S%.3f UTC")
    );
    if let Some(error) = &report.last_error {
        let _ = writeln!(out, "  Last error: {}", error);
    }
    out
}

/// Machine-readable summary
pub fn render_json(report: &RelayReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize relay report")
}

/// Print the outcome of a relay run
pub fn print(report: &RelayReport, json: bool) -> Result<()> {
    if json {
        println!("{}", render_json(report)?);
        return Ok(());
    }

    println!("\n{}", status_message(report.status));
    print!("{}", render_summary(report));
    Ok(())
}
