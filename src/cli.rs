use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use tracing_subscriber::filter::{self, Directive};

/// Browse Reddit from the terminal.
#[derive(Parser, Debug, Clone)]
#[clap(name = "zennit", author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to read instead of the default location.
    #[clap(long, short)]
    pub config: Option<PathBuf>,
    /// Feed to open, e.g. r/rust, u/spez or user/alice/m/tech.
    #[clap(long, short)]
    pub subreddit: Option<String>,
    #[clap(long, short, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
    /// Print config, preference and log locations, then exit.
    #[clap(long)]
    pub print_paths: bool,
    /// Serve canned posts instead of calling Reddit.
    #[clap(long)]
    pub offline: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    None,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::None => "none",
        };
        write!(f, "{s}")
    }
}

impl TryFrom<LogLevel> for Directive {
    type Error = filter::ParseError;
    fn try_from(value: LogLevel) -> Result<Self, Self::Error> {
        match value {
            LogLevel::None => Directive::from_str("off"),
            level => Directive::from_str(&level.to_string()),
        }
    }
}
