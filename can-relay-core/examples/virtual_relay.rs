//! Relay demo over two virtual channels
//!
//! A producer thread writes frames on `virtual:demo-in`, the engine relays them
//! to `virtual:demo-out`, and the main thread prints what arrives.
//!
//! Usage:
//!   cargo run --example virtual_relay [seconds]
//!
//! Set RUST_LOG=debug (or trace) to watch the engine's state transitions.

use can_relay_core::{
    CanBus, CanFrame, CancelToken, InterfaceFactory, RelayConfig, RelayEngine, RelayRequest,
    VirtualBus,
};
use embedded_can::StandardId;
use std::env;
use std::thread;
use std::time::Duration;

fn main() {
    env_logger::init();

    let seconds: f64 = env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(2.0);

    let config = RelayConfig::new().with_poll_timeout(Duration::from_millis(50));
    let engine = match RelayEngine::new(config.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let request = match RelayRequest::new("virtual:demo-in", "virtual:demo-out")
        .with_duration_secs(seconds)
    {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let mut listener = VirtualBus::open("demo-out", 64).expect("open demo-out");
    let mut producer = VirtualBus::open("demo-in", 64).expect("open demo-in");

    let cancel = CancelToken::new();
    let relay = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            let factory = InterfaceFactory::new(&config);
            engine.run(&factory, &request, &cancel)
        })
    };

    thread::spawn(move || {
        let id = StandardId::new(0x123).expect("valid id");
        let mut counter = 0u8;
        loop {
            let frame = CanFrame::new_data(id, &[counter, counter.wrapping_mul(3)]).expect("frame");
            if producer.send(&frame).is_err() {
                break;
            }
            counter = counter.wrapping_add(1);
            thread::sleep(Duration::from_millis(100));
        }
    });

    while !relay.is_finished() {
        if let Ok(Some(frame)) = listener.receive(Duration::from_millis(100)) {
            println!("demo-out  {}", frame);
        }
    }

    let report = relay.join().expect("relay thread");
    println!("\n=== RELAY SUMMARY ===");
    println!("Status:    {}", report.status);
    println!("Received:  {}", report.frames_received);
    println!("Forwarded: {}", report.frames_forwarded);
    println!("Dropped:   {}", report.frames_dropped);
    println!("Elapsed:   {:.2}s", report.running_secs());
}
