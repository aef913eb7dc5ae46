//! Command line definition and conversion to internal types.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::native::Severity;

/// Fall-back notification message.
pub const DEFAULT_MESSAGE: &str = "You've been bugged!";
/// Fall-back notification title.
pub const DEFAULT_TITLE: &str = "Traybell";

/// Command line interface definition.
#[derive(Parser, Debug)]
#[command(
    version,
    about = concat!(
        env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"),
        " - Show a tray balloon notification from the command line.",
    )
)]
pub struct Cli {
    /// The notification message to display.
    #[arg(default_value = DEFAULT_MESSAGE)]
    pub message: String,
    /// The notification title to display.
    #[arg(default_value = DEFAULT_TITLE)]
    pub title: String,
    /// Severity of the balloon (selects the glyph shown next to the title).
    #[arg(long, value_enum, default_value_t = SeverityArg::User)]
    pub severity: SeverityArg,
    /// Tag the tray entry with an explicit GUID identity (canonical dashed form).
    #[arg(long)]
    pub guid: Option<String>,
    /// Icon file for the tray entry; the stock information icon is the fallback.
    #[arg(long)]
    pub icon: Option<PathBuf>,
    /// Test Win32 API linkage with a message box instead of notifying.
    #[arg(short = 'w', long = "win32")]
    pub win32: bool,
    /// Increase verbosity (-v=debug, -vv=trace). Overrides RUST_LOG.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
    /// Quiet mode: only warnings and errors. Overrides -v and RUST_LOG.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

/// CLI-facing severity names.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeverityArg {
    Info,
    Warning,
    Error,
    User,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
            SeverityArg::User => Severity::User,
        }
    }
}

/// Resolved logging verbosity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Warn,
    Info,
    Debug,
    Trace,
}

impl Cli {
    /// Precedence: `quiet` wins, then `-v` occurrences, then the default.
    pub fn log_level(&self) -> LogLevel {
        if self.quiet {
            LogLevel::Warn
        } else if self.verbose > 1 {
            LogLevel::Trace
        } else if self.verbose == 1 {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}
