use adcsio_frame::INITIATE_DOWNLOAD_BURST;
use adcsio_transport::sim::BurstPlan;
use adcsio_transport::{AdcsError, TransportFailure};
use serde::Serialize;
use tracing::{info, warn};

use crate::cmd::{override_duration, simulated_transport, DownloadArgs};
use crate::exit::{adcs_error, CliResult, FAILURE, SUCCESS};
use crate::output::{parse_hex, print_json, print_rows, to_hex, OutputFormat};
use crate::profile::Profile;

#[derive(Serialize)]
struct PacketOutput {
    counter: u16,
    data: String,
}

#[derive(Serialize)]
struct DownloadOutput {
    requested: u16,
    received: u32,
    failed: u32,
    packets: Vec<PacketOutput>,
}

pub fn run(args: DownloadArgs, format: OutputFormat, profile: &Profile) -> CliResult<i32> {
    let mut config = profile.download();
    config.byte_timeout = override_duration(args.byte_timeout.as_deref(), config.byte_timeout)?;
    let garbage = args.garbage.as_deref().map(parse_hex).transpose()?;

    let (transport, sim) = simulated_transport(profile.transport());
    let mut plan = BurstPlan::counting(args.packets, config.layout.data_len);
    if let Some(garbage) = garbage {
        plan = plan.with_leading_garbage(garbage);
    }
    sim.set_burst(plan);

    let mut session = transport
        .enter_file_download_mode(config)
        .map_err(|err| adcs_error("entering download mode failed", err))?;
    session
        .send_command_no_reply(&[INITIATE_DOWNLOAD_BURST])
        .map_err(|err| adcs_error("initiating burst failed", err))?;

    let mut packets = Vec::new();
    loop {
        match session.receive_file_download_packet() {
            Ok(packet) => packets.push(PacketOutput {
                counter: packet.counter,
                data: to_hex(&packet.data),
            }),
            // The device goes quiet once the burst is over.
            Err(AdcsError::TransportFailed(TransportFailure::RxTimeout { .. })) => break,
            Err(err @ AdcsError::IncorrectLength { .. }) => {
                warn!(error = %err, "skipping damaged packet");
            }
            Err(err) => return Err(adcs_error("download failed", err)),
        }
    }

    // The final timeout that ends the burst is not a packet failure.
    let failed = session.packets_failed().saturating_sub(1);
    let received = session.packets_received();
    session.exit();
    info!(received, failed, "download finished");

    let out = DownloadOutput {
        requested: args.packets,
        received,
        failed,
        packets,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_rows(
            vec!["COUNTER", "DATA"],
            out.packets
                .iter()
                .map(|p| vec![p.counter.to_string(), p.data.clone()])
                .collect(),
        ),
        OutputFormat::Pretty | OutputFormat::Raw => {
            for p in &out.packets {
                println!("{:5} {}", p.counter, p.data);
            }
            println!("received {}/{} packets", out.received, out.requested);
        }
    }

    if received == u32::from(args.packets) {
        Ok(SUCCESS)
    } else {
        Ok(FAILURE)
    }
}
