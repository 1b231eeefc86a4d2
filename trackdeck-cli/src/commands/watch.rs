//! `watch`: print the status report on every refresh interval.

use super::common::{resolve_session_config, start_session, SessionArgs};
use crate::error::CliError;
use crate::runner::CliRunner;
use crate::tui_app::{install_shutdown_handler, run_headless};

pub fn run(args: SessionArgs, count: Option<u64>, diagnostics: bool) -> Result<(), CliError> {
    if count == Some(0) {
        return Err(CliError::Config("--count must be at least 1".to_string()));
    }

    let runner = CliRunner::new(true)?;
    runner.log_startup("watch");

    let config = resolve_session_config(&args, runner.config())?;
    let interval = config.feed.refresh_interval;
    let shutdown = install_shutdown_handler()?;
    let session = start_session(&runner, &args, config)?;
    if diagnostics {
        session.run_diagnostics();
    }

    let result = run_headless(&session, shutdown, interval, count);
    runner.block_on(session.shutdown());
    result
}
