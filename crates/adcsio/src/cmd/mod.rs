use std::time::Duration;

use adcsio_link::Link;
use adcsio_transport::sim::SimulatedAdcs;
use adcsio_transport::{AdcsTransport, TransportConfig};
use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;
use crate::profile::Profile;

pub mod command;
pub mod download;
pub mod i2c;
pub mod stuff;
pub mod telemetry;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Byte-stuff hex input the way it goes on the wire.
    Stuff(BytesArgs),
    /// Remove byte stuffing from hex input.
    Destuff(BytesArgs),
    /// Send a telecommand to the simulated ADCS over UART.
    Command(CommandArgs),
    /// Request a telemetry frame from the simulated ADCS over UART.
    Telemetry(TelemetryArgs),
    /// Run a file-download burst against the simulated ADCS.
    Download(DownloadArgs),
    /// Send a telecommand over the simulated I2C path and poll for its ack.
    I2c(I2cArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, profile: &Profile) -> CliResult<i32> {
    match command {
        Command::Stuff(args) => stuff::run_stuff(args, format),
        Command::Destuff(args) => stuff::run_destuff(args, format),
        Command::Command(args) => command::run(args, format, profile),
        Command::Telemetry(args) => telemetry::run(args, format, profile),
        Command::Download(args) => download::run(args, format, profile),
        Command::I2c(args) => i2c::run(args, format, profile),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct BytesArgs {
    /// Input bytes as hex (e.g. "0a 1f 02").
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct CommandArgs {
    /// Telecommand bytes as hex: ID followed by parameters.
    pub hex: String,
    /// Status byte the simulated device acknowledges with.
    #[arg(long, default_value = "0", value_parser = parse_byte)]
    pub status: u8,
    /// Send without waiting for an acknowledgment.
    #[arg(long)]
    pub no_reply: bool,
    /// Make the simulated device ignore the command.
    #[arg(long)]
    pub silent: bool,
    /// Per-byte reply timeout (e.g. 100ms, 1s).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct TelemetryArgs {
    /// Telemetry ID (decimal or 0x-prefixed hex, 128-255).
    #[arg(value_parser = parse_byte)]
    pub id: u8,
    /// Payload the simulated device returns, as hex. Defaults to a counting pattern.
    #[arg(long)]
    pub payload: Option<String>,
    /// Expected payload length. Defaults to the payload's length.
    #[arg(long)]
    pub len: Option<usize>,
    /// Per-byte reply timeout (e.g. 100ms, 1s).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Number of packets the simulated device streams.
    #[arg(long, default_value = "8")]
    pub packets: u16,
    /// Line noise sent ahead of the first packet, as hex.
    #[arg(long)]
    pub garbage: Option<String>,
    /// Per-byte wait while the burst streams (e.g. 200ms).
    #[arg(long)]
    pub byte_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct I2cArgs {
    /// Telecommand bytes as hex: ID followed by parameters.
    pub hex: String,
    /// Acknowledgment polls before the device reports the command processed.
    #[arg(long, default_value = "2")]
    pub polls: usize,
    /// Error flag the device reports once processed.
    #[arg(long, default_value = "0", value_parser = parse_byte)]
    pub error_flag: u8,
    /// Never set the processed flag.
    #[arg(long)]
    pub never_processed: bool,
    /// Total time to wait for the processed flag (e.g. 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// UART transport wired to a fresh simulated device.
pub(crate) fn simulated_transport(
    config: TransportConfig,
) -> (AdcsTransport<SimulatedAdcs>, SimulatedAdcs) {
    let link = Link::default();
    let sim = SimulatedAdcs::new(link.notifier());
    (AdcsTransport::with_config(sim.clone(), link, config), sim)
}

/// Parse a byte written in decimal or with a `0x` prefix.
pub(crate) fn parse_byte(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("not a byte value: {input}"))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, from): (&str, fn(u64) -> Duration) = if let Some(num) = input.strip_suffix("ms")
    {
        (num, Duration::from_millis)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, Duration::from_secs)
    } else {
        (input, Duration::from_millis)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }
    Ok(from(value))
}

/// Apply an optional `--timeout`-style override.
pub(crate) fn override_duration(input: Option<&str>, default: Duration) -> CliResult<Duration> {
    input.map(parse_duration).transpose().map(|d| d.unwrap_or(default))
}
