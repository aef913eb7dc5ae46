//! Command-line tray balloon notifier for Windows.
//!
//! Puts an icon in the notification area, posts one balloon message, and
//! blocks in the native message loop until the balloon is dismissed (hidden,
//! timed out, or clicked), then removes the icon, destroys the owning hidden
//! window, and unregisters its class — in that order.
//!
//! High-level flow:
//! 1. Parse CLI (message/title with defaults, severity, optional GUID tag).
//! 2. Initialize tracing from `-q`/`-v` or RUST_LOG.
//! 3. Either run the MessageBox linkage smoke test, or deliver one
//!    notification through the injected native layer and exit with the
//!    message loop's code.

mod app;
mod cli;
mod error;
mod guid;
mod logging;
mod msgloop;
mod native;
mod notify;
mod registry;
mod tray;
#[cfg(windows)]
mod win32;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use cli::Cli;
use error::{EXIT_UNKNOWN_ERROR, EXIT_USAGE_ERROR};
use guid::Guid;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::configure_logging(cli.log_level());
    info!(
        version = env!("CARGO_PKG_VERSION"),
        ?cli,
        "starting traybell"
    );

    if cli.win32 {
        smoke_test();
        return ExitCode::SUCCESS;
    }

    let guid = match parse_guid_arg(cli.guid.as_deref()) {
        Ok(guid) => guid,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    let request = app::NotifyRequest {
        message: cli.message,
        title: cli.title,
        severity: cli.severity.into(),
        guid,
        icon_path: cli.icon.or_else(default_icon_path),
    };
    notify_exit_code(&request)
}

/// Canonical-form GUID argument, when one was given.
fn parse_guid_arg(arg: Option<&str>) -> anyhow::Result<Option<Guid>> {
    arg.map(|text| {
        text.parse::<Guid>()
            .with_context(|| format!("--guid {text:?} is not a canonical dashed UUID"))
    })
    .transpose()
}

/// The packaged glyph: an .ico file beside the executable.
fn default_icon_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join("traybell.ico"))
}

#[cfg(windows)]
fn notify_exit_code(request: &app::NotifyRequest) -> ExitCode {
    use error::EXIT_API_ERROR;
    use std::sync::Arc;

    match app::deliver(Arc::new(win32::Win32Api), request) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(EXIT_UNKNOWN_ERROR)),
        Err(e) => {
            error!(%e, "notification failed");
            ExitCode::from(EXIT_API_ERROR)
        }
    }
}

#[cfg(not(windows))]
fn notify_exit_code(_request: &app::NotifyRequest) -> ExitCode {
    error!("tray notifications require the Windows shell");
    ExitCode::from(EXIT_UNKNOWN_ERROR)
}

#[cfg(windows)]
fn smoke_test() {
    win32::hello();
}

#[cfg(not(windows))]
fn smoke_test() {
    info!("Win32 linkage smoke test is a no-op on this platform");
}
