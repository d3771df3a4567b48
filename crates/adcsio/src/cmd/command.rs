use adcsio_frame::{ids::id_name, TcStatus};
use serde::Serialize;
use tracing::info;

use crate::cmd::{override_duration, simulated_transport, CommandArgs};
use crate::exit::{adcs_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{parse_hex, print_fields, print_json, to_hex, OutputFormat};
use crate::profile::Profile;

#[derive(Serialize)]
struct CommandOutput {
    id: u8,
    id_name: &'static str,
    wire: String,
    acknowledged: bool,
    status: Option<u8>,
    status_name: Option<&'static str>,
}

pub fn run(args: CommandArgs, format: OutputFormat, profile: &Profile) -> CliResult<i32> {
    let command = parse_hex(&args.hex)?;
    let Some(&id) = command.first() else {
        return Err(CliError::usage("telecommand must include an ID byte"));
    };

    let mut config = profile.transport();
    config.byte_timeout = override_duration(args.timeout.as_deref(), config.byte_timeout)?;
    let (transport, sim) = simulated_transport(config);
    sim.set_status(TcStatus(args.status));
    sim.set_silent(args.silent);

    let status = if args.no_reply {
        transport
            .send_command_no_reply(&command)
            .map_err(|err| adcs_error("telecommand failed", err))?;
        None
    } else {
        let status = transport
            .send_command_await_reply(&command)
            .map_err(|err| adcs_error("telecommand failed", err))?;
        info!(id, %status, "telecommand acknowledged");
        Some(status)
    };

    let wire = sim
        .sent_frames()
        .first()
        .map(|frame| to_hex(frame))
        .unwrap_or_default();
    let out = CommandOutput {
        id,
        id_name: id_name(id),
        wire,
        acknowledged: status.is_some(),
        status: status.map(TcStatus::code),
        status_name: status.map(TcStatus::name),
    };
    print_command(&out, format);

    match status {
        Some(status) if !status.is_ok() => Ok(FAILURE),
        _ => Ok(SUCCESS),
    }
}

fn print_command(out: &CommandOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_fields(&[
            ("id", format!("{} ({})", out.id, out.id_name)),
            ("wire", out.wire.clone()),
            ("status", status_text(out)),
        ]),
        OutputFormat::Pretty | OutputFormat::Raw => println!("{}", status_text(out)),
    }
}

fn status_text(out: &CommandOutput) -> String {
    match (out.status, out.status_name) {
        (Some(code), Some(name)) => format!("{name} ({code})"),
        _ => "sent, no acknowledgment expected".to_string(),
    }
}
