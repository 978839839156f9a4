//! Logging setup shared by programs built on netchan.
//!
//! Flatten [`LogArgs`] into a clap parser and call [`LogArgs::init`].
//! Output goes to stderr so stdout stays free for values.

use clap::{Args, ValueEnum};
use tracing::level_filters::LevelFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Command-line switches controlling log output.
#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "NETCHAN_LOG",
        global = true
    )]
    pub log_level: LogLevel,
}

impl LogArgs {
    pub fn init(&self) {
        init_logging(self.log_format, self.log_level);
    }
}

/// Install a global `fmt` subscriber. A second call is a no-op.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_thread_names(true)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(flatten)]
        log: LogArgs,
    }

    #[test]
    fn defaults_to_text() {
        let cli = Cli::try_parse_from(["demo"]).expect("defaults should parse");
        assert_eq!(cli.log.log_format, LogFormat::Text);
    }

    #[test]
    fn parses_json_and_level() {
        let cli = Cli::try_parse_from(["demo", "--log-format", "json", "--log-level", "debug"])
            .expect("log args should parse");
        assert_eq!(cli.log.log_format, LogFormat::Json);
        assert_eq!(cli.log.log_level.as_filter(), LevelFilter::DEBUG);
    }

    #[test]
    fn rejects_unknown_level() {
        let err = Cli::try_parse_from(["demo", "--log-level", "loud"]).expect_err("bad level");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn init_twice_is_harmless() {
        init_logging(LogFormat::Text, LogLevel::Off);
        init_logging(LogFormat::Json, LogLevel::Trace);
    }
}
