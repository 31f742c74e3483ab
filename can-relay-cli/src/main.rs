//! CAN Relay CLI Application
//!
//! This is the command-line interface for the CAN relay. It uses the
//! can-relay-core library and adds:
//! - Argument parsing and TOML configuration files
//! - Ctrl+C handling (raises the engine's cancellation flag)
//! - Summary output (text or JSON) and exit codes

use anyhow::{Context, Result};
use can_relay_core::{CancelToken, InterfaceFactory, RelayEngine};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

mod config;
mod report;

/// CAN Relay - Forward CAN traffic from one interface to another
#[derive(Parser, Debug)]
#[command(name = "can-relay")]
#[command(about = "Forward CAN traffic from one interface to another", long_about = None)]
#[command(version)]
struct Args {
    /// Source CAN interface (can0, socketcanfd:can0, virtual:<channel>)
    #[arg(short, long, value_name = "IFACE")]
    source: Option<String>,

    /// Target CAN interface
    #[arg(short, long, value_name = "IFACE")]
    target: Option<String>,

    /// Duration in seconds to run the relay (0 or omitted: until Ctrl+C)
    #[arg(short, long, value_name = "SECONDS", allow_negative_numbers = true)]
    duration: Option<f64>,

    /// Path to configuration file (relay.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Longest single wait on the source bus
    #[arg(long, value_name = "MS")]
    poll_timeout_ms: Option<u64>,

    /// Bounded wait for the target to accept a frame
    #[arg(long, value_name = "MS")]
    send_timeout_ms: Option<u64>,

    /// Consecutive send failures before the target is declared unreachable
    #[arg(long, value_name = "COUNT")]
    max_send_failures: Option<u32>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn overrides(&self) -> config::Overrides {
        config::Overrides {
            source: self.source.clone(),
            target: self.target.clone(),
            duration: self.duration,
            poll_timeout_ms: self.poll_timeout_ms,
            send_timeout_ms: self.send_timeout_ms,
            max_send_failures: self.max_send_failures,
        }
    }
}

fn main() -> ExitCode {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(report::EXIT_USAGE)
        }
    }
}

/// Resolve settings, relay until a stop condition, report
fn run(args: &Args) -> Result<u8> {
    log::info!("CAN Relay CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using relay library v{}", can_relay_core::VERSION);

    let file_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => config::AppConfig::default(),
    };
    let settings = file_config.resolve(args.overrides())?;
    log::debug!("Engine settings: {:?}", settings.engine);

    let engine = RelayEngine::new(settings.engine.clone())?;
    let factory = InterfaceFactory::new(&settings.engine);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("Failed to install Ctrl+C handler")?;

    if !args.json && !args.quiet {
        println!("{}", report::banner(&settings.request));
    }

    let relay_report = engine.run(&factory, &settings.request, &cancel);

    if args.json || !args.quiet {
        report::print(&relay_report, args.json)?;
    }

    Ok(report::exit_code(relay_report.status))
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
