use adcsio_transport::sim::SimulatedI2c;
use adcsio_transport::I2cPollClient;
use serde::Serialize;

use crate::cmd::{override_duration, I2cArgs};
use crate::exit::{adcs_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{parse_hex, print_fields, print_json, OutputFormat};
use crate::profile::Profile;

#[derive(Serialize)]
struct I2cOutput {
    address: u8,
    id: u8,
    polls: u32,
    status: u8,
    status_name: &'static str,
}

pub fn run(args: I2cArgs, format: OutputFormat, profile: &Profile) -> CliResult<i32> {
    let command = parse_hex(&args.hex)?;
    let Some(&id) = command.first() else {
        return Err(CliError::usage("telecommand must include an ID byte"));
    };

    let mut config = profile.i2c();
    config.poll_timeout = override_duration(args.timeout.as_deref(), config.poll_timeout)?;
    let device = SimulatedI2c::new(config.address);
    let device = if args.never_processed {
        device.never_processed()
    } else {
        device.processed_after(args.polls, args.error_flag)
    };

    let mut client = I2cPollClient::new(device, config);
    let status = client
        .send_command_await_ack(&command)
        .map_err(|err| adcs_error("i2c telecommand failed", err))?;

    let out = I2cOutput {
        address: config.address,
        id,
        polls: client.get_ref().ack_reads(),
        status: status.code(),
        status_name: status.name(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&[
            ("address", format!("0x{:02x}", out.address)),
            ("id", out.id.to_string()),
            ("ack reads", out.polls.to_string()),
            ("status", status.to_string()),
        ]),
        OutputFormat::Pretty | OutputFormat::Raw => println!("{status}"),
    }

    if status.is_ok() {
        Ok(SUCCESS)
    } else {
        Ok(FAILURE)
    }
}
