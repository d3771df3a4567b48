use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Target prefix shared by every crate in the workspace.
const ADCSIO_TARGET: &str = "adcsio";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// `level` for the adcsio crates; everything else is held at `warn` or quieter.
fn target_filter(level: LogLevel) -> Targets {
    let level = level.as_filter();
    Targets::new()
        .with_target(ADCSIO_TARGET, level)
        .with_default(level.min(LevelFilter::WARN))
}

/// Install the stderr subscriber. The transport crates only emit events.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = target_filter(level);
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false);

    let _ = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(layer.json().with_filter(filter))
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn workspace_crates_follow_requested_level() {
        let filter = target_filter(LogLevel::Trace);
        assert!(filter.would_enable("adcsio_frame::download", &Level::TRACE));
        assert!(filter.would_enable("adcsio_transport::bus", &Level::DEBUG));
    }

    #[test]
    fn other_targets_are_capped_at_warn() {
        let filter = target_filter(LogLevel::Debug);
        assert!(!filter.would_enable("parking_lot", &Level::DEBUG));
        assert!(filter.would_enable("parking_lot", &Level::WARN));

        let quiet = target_filter(LogLevel::Error);
        assert!(!quiet.would_enable("parking_lot", &Level::WARN));
        assert!(!quiet.would_enable("adcsio_transport::engine", &Level::WARN));
    }
}
