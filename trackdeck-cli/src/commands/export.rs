//! `export`: render one snapshot through the full bootstrap and save a PNG.

use std::path::PathBuf;
use std::time::Duration;

use trackdeck::engine::{EngineState, Surface};
use trackdeck::session::TrackerSession;

use super::common::{resolve_session_config, start_session, SessionArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the export command.
pub struct ExportArgs {
    pub session: SessionArgs,
    pub out: PathBuf,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: bool,
    /// Seconds to wait for the engine and the first snapshot.
    pub wait: Option<u64>,
}

pub fn run(args: ExportArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(true)?;
    runner.log_startup("export");

    let mut config = resolve_session_config(&args.session, runner.config())?.with_push(false);
    config.map.surface = Surface::new(
        args.width.unwrap_or(config.map.surface.width),
        args.height.unwrap_or(config.map.surface.height),
    );
    if !config.map.surface.is_measured() {
        return Err(CliError::Config(format!(
            "export size must be non-zero, got {}",
            config.map.surface
        )));
    }

    let wait = Duration::from_secs(args.wait.unwrap_or(
        config.map.bootstrap_deadline.as_secs() + config.feed.request_timeout.as_secs(),
    ));
    let surface = config.map.surface;

    let session = start_session(&runner, &args.session, config)?;
    let frame = runner.block_on(export_frame(&session, args.fit, wait));
    let state = session.engine_state();
    runner.block_on(session.shutdown());
    let (png, kind) = frame?;

    std::fs::write(&args.out, &png)
        .map_err(|e| CliError::Export(format!("{}: {}", args.out.display(), e)))?;

    println!(
        "Wrote {} ({}, {} renderer, {} bytes)",
        args.out.display(),
        surface,
        kind,
        png.len()
    );
    if let EngineState::FallbackActive { reason } = state {
        println!("Fallback was used: {}", reason);
    }
    Ok(())
}

async fn export_frame(
    session: &TrackerSession,
    fit: bool,
    wait: Duration,
) -> Result<(Vec<u8>, &'static str), CliError> {
    tokio::time::timeout(wait, session.settled())
        .await
        .map_err(|_| CliError::Timeout("map engine did not become ready".to_string()))?;

    let mut snapshots = session.subscribe_snapshots();
    let generation = tokio::time::timeout(wait, snapshots.wait_for(Option::is_some))
        .await
        .map_err(|_| CliError::Timeout("no snapshot received from the feed".to_string()))?
        .map_err(|_| CliError::Export("feed stopped before delivering a snapshot".to_string()))?
        .as_ref()
        .map(|published| published.generation)
        .unwrap_or(0);

    if fit {
        session.request_fit();
    }

    tokio::time::timeout(wait, async {
        loop {
            let rendered = session
                .last_render()
                .is_some_and(|o| {
                    o.generation >= generation && (o.fitted || !fit || o.rendered == 0)
                });
            if rendered {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .map_err(|_| CliError::Timeout("snapshot was not rendered".to_string()))?;

    let renderer = session
        .renderer()
        .ok_or_else(|| CliError::Export("no renderer available".to_string()))?;
    let png = renderer
        .export_png()
        .await
        .map_err(|e| CliError::Export(e.to_string()))?;
    Ok((png, renderer.kind().as_str()))
}
