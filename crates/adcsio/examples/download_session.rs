//! File download against the simulated ADCS, sharing the UART with a
//! telemetry poller on another thread.
//!
//! Run with:
//!   cargo run --example download-session
//!
//! The poller gets `BusBusy` while the burst holds the bus and resumes once
//! the session exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use adcsio::frame::{ESC, INITIATE_DOWNLOAD_BURST};
use adcsio::link::Link;
use adcsio::transport::sim::{BurstPlan, SimulatedAdcs};
use adcsio::transport::{AdcsError, AdcsTransport, DownloadConfig, TransportConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let link = Link::default();
    let sim = SimulatedAdcs::new(link.notifier());
    sim.set_telemetry(0x92, vec![0x01, 0x02, 0x03, 0x04].into());
    sim.set_burst(BurstPlan::counting(16, 20).with_leading_garbage(vec![0x00, ESC]));

    let config = TransportConfig {
        bus_timeout: Duration::from_millis(5),
        ..TransportConfig::default()
    };
    let transport = Arc::new(AdcsTransport::with_config(sim, link, config));
    let done = Arc::new(AtomicBool::new(false));

    let poller = {
        let transport = Arc::clone(&transport);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let (mut ok, mut busy) = (0u32, 0u32);
            while !done.load(Ordering::Relaxed) {
                match transport.request_telemetry(0x92, 4) {
                    Ok(_) => ok += 1,
                    Err(AdcsError::BusBusy(_)) => busy += 1,
                    Err(e) => eprintln!("telemetry failed: {e}"),
                }
                thread::sleep(Duration::from_millis(2));
            }
            (ok, busy)
        })
    };

    thread::sleep(Duration::from_millis(10));
    let mut session = transport.enter_file_download_mode(DownloadConfig::default())?;
    session.send_command_no_reply(&[INITIATE_DOWNLOAD_BURST])?;

    let mut received = 0;
    while received < 16 {
        let packet = session.receive_file_download_packet()?;
        eprintln!("packet {:3}: {} bytes", packet.counter, packet.data.len());
        received += 1;
    }
    session.exit();

    thread::sleep(Duration::from_millis(10));
    done.store(true, Ordering::Relaxed);
    let (ok, busy) = poller.join().map_err(|_| "poller panicked")?;
    eprintln!("telemetry polls: {ok} ok, {busy} busy");
    eprintln!("bus stats: {:?}", transport.bus_stats());
    Ok(())
}
