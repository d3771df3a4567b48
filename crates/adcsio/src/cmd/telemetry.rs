use adcsio_frame::ids::is_telemetry;
use bytes::Bytes;
use serde::Serialize;

use crate::cmd::{override_duration, simulated_transport, TelemetryArgs};
use crate::exit::{adcs_error, CliError, CliResult, SUCCESS};
use crate::output::{parse_hex, print_fields, print_json, print_raw, to_hex, OutputFormat};
use crate::profile::Profile;

const DEFAULT_PATTERN_LEN: usize = 8;

#[derive(Serialize)]
struct TelemetryOutput {
    id: u8,
    len: usize,
    data: String,
}

pub fn run(args: TelemetryArgs, format: OutputFormat, profile: &Profile) -> CliResult<i32> {
    if !is_telemetry(args.id) {
        return Err(CliError::usage(format!(
            "{} is a telecommand ID; telemetry IDs are 128-255",
            args.id
        )));
    }
    let payload = match &args.payload {
        Some(hex) => parse_hex(hex)?,
        None => (0..args.len.unwrap_or(DEFAULT_PATTERN_LEN))
            .map(|i| i as u8)
            .collect(),
    };
    let expected_len = args.len.unwrap_or(payload.len());

    let mut config = profile.transport();
    config.byte_timeout = override_duration(args.timeout.as_deref(), config.byte_timeout)?;
    let (transport, sim) = simulated_transport(config);
    sim.set_telemetry(args.id, Bytes::from(payload));

    let data = transport
        .request_telemetry(args.id, expected_len)
        .map_err(|err| adcs_error("telemetry request failed", err))?;

    match format {
        OutputFormat::Json => print_json(&TelemetryOutput {
            id: args.id,
            len: data.len(),
            data: to_hex(&data),
        }),
        OutputFormat::Table => print_fields(&[
            ("id", args.id.to_string()),
            ("length", data.len().to_string()),
            ("data", to_hex(&data)),
        ]),
        OutputFormat::Pretty => println!("{}", to_hex(&data)),
        OutputFormat::Raw => print_raw(&data),
    }
    Ok(SUCCESS)
}
