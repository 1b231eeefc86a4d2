//! `run`: the interactive dashboard, or status lines when stdout is not a
//! terminal.

use tracing::info;

use super::common::{resolve_session_config, start_session, SessionArgs};
use crate::error::CliError;
use crate::runner::CliRunner;
use crate::tui_app::{install_shutdown_handler, run_headless, run_tui};

pub fn run(args: SessionArgs, headless: bool) -> Result<(), CliError> {
    let interactive = !headless && atty::is(atty::Stream::Stdout);
    // Log lines on stderr would tear the dashboard.
    let runner = CliRunner::new(!interactive)?;
    runner.log_startup("run");

    let config = resolve_session_config(&args, runner.config())?;
    let interval = config.feed.refresh_interval;
    let shutdown = install_shutdown_handler()?;
    let session = start_session(&runner, &args, config)?;

    let result = if interactive {
        run_tui(&session, shutdown)
    } else {
        run_headless(&session, shutdown, interval, None)
    };

    runner.block_on(session.shutdown());
    info!("trackdeck stopped");
    result
}
