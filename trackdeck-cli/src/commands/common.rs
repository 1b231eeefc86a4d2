//! Common types and utilities shared across CLI commands.

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use trackdeck::config::ConfigFile;
use trackdeck::credential::resolve_default_credential;
use trackdeck::engine::StaticCapability;
use trackdeck::model::FeedMode;
use trackdeck::session::{SessionConfig, SessionDeps, TrackerSession};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Feed mode selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ModeArg {
    /// Flights and ships
    Combined,
    /// Flights only
    Flights,
    /// Ships only
    Ships,
}

impl From<ModeArg> for FeedMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Combined => FeedMode::Combined,
            ModeArg::Flights => FeedMode::Flights,
            ModeArg::Ships => FeedMode::Ships,
        }
    }
}

/// Options shared by every command that opens a tracking session.
#[derive(Debug, Clone, Default, Args)]
pub struct SessionArgs {
    /// Entities to track (defaults to the configured mode)
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Feed base URL (e.g. http://localhost:8000/api/tracker)
    #[arg(long)]
    pub feed_url: Option<String>,

    /// Poll interval in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Poll only; do not open the live push channel
    #[arg(long)]
    pub no_push: bool,

    /// Skip the accelerated renderer and use raster tiles
    #[arg(long)]
    pub force_fallback: bool,

    /// Map style URL
    #[arg(long)]
    pub style: Option<String>,
}

/// Resolve session settings: CLI takes precedence, then config.
pub fn resolve_session_config(
    args: &SessionArgs,
    config: &ConfigFile,
) -> Result<SessionConfig, CliError> {
    let mut session = SessionConfig::from(config).with_push(!args.no_push);

    if let Some(mode) = args.mode {
        session.feed.mode = mode.into();
    }
    if let Some(url) = &args.feed_url {
        session.feed.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(interval) = args.interval {
        if interval == 0 {
            return Err(CliError::Config(
                "--interval must be at least 1 second".to_string(),
            ));
        }
        session.feed.refresh_interval = Duration::from_secs(interval);
    }
    if let Some(style) = &args.style {
        session.map.style_url = style.clone();
    }

    Ok(session)
}

/// Build production collaborators, honouring `--force-fallback`.
pub fn build_deps(args: &SessionArgs, config: &SessionConfig) -> Result<SessionDeps, CliError> {
    let mut deps = SessionDeps::production(config, resolve_default_credential())?;
    if args.force_fallback {
        deps.bootstrap = deps.bootstrap.with_capability(Arc::new(StaticCapability::missing(
            "accelerated renderer disabled by --force-fallback",
        )));
    }
    Ok(deps)
}

/// Start a session on the runner's runtime.
pub fn start_session(
    runner: &CliRunner,
    args: &SessionArgs,
    config: SessionConfig,
) -> Result<TrackerSession, CliError> {
    let deps = build_deps(args, &config)?;
    let _guard = runner.runtime().enter();
    Ok(TrackerSession::start(config, deps))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = SessionArgs {
            mode: Some(ModeArg::Ships),
            feed_url: Some("http://feed.example.com/api/".to_string()),
            interval: Some(3),
            no_push: true,
            ..SessionArgs::default()
        };
        let session = resolve_session_config(&args, &ConfigFile::default()).unwrap();

        assert_eq!(session.feed.mode, FeedMode::Ships);
        assert_eq!(session.feed.base_url, "http://feed.example.com/api");
        assert_eq!(session.feed.refresh_interval, Duration::from_secs(3));
        assert!(!session.push_enabled);
    }

    #[test]
    fn test_config_used_without_overrides() {
        let mut config = ConfigFile::default();
        config.feed.mode = FeedMode::Flights;
        let session = resolve_session_config(&SessionArgs::default(), &config).unwrap();

        assert_eq!(session.feed.mode, FeedMode::Flights);
        assert!(session.push_enabled);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let args = SessionArgs {
            interval: Some(0),
            ..SessionArgs::default()
        };
        assert!(matches!(
            resolve_session_config(&args, &ConfigFile::default()),
            Err(CliError::Config(_))
        ));
    }
}
