mod cmd;
mod exit;
mod logging;
mod output;
mod profile;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;
use crate::profile::Profile;

#[derive(Parser, Debug)]
#[command(name = "adcsio", version, about = "ADCS transport CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// JSON file with timeout overrides.
    #[arg(long, value_name = "FILE", global = true, env = "ADCSIO_PROFILE")]
    profile: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cli
        .profile
        .as_deref()
        .map(Profile::load)
        .transpose()
        .and_then(|profile| cmd::run(cli.command, format, &profile.unwrap_or_default()));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
