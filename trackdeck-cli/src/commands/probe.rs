//! `probe`: check that the map style and its resources are reachable.

use std::sync::Arc;
use std::time::Duration;

use trackdeck::diagnostics::DiagnosticsProbe;
use trackdeck::http::ReqwestClient;

use crate::error::CliError;
use crate::runner::CliRunner;

pub fn run(style: Option<String>) -> Result<(), CliError> {
    let runner = CliRunner::new(true)?;
    runner.log_startup("probe");
    let config = runner.config();

    let style_url = style.unwrap_or_else(|| config.map.style_url.clone());
    let timeout = Duration::from_secs(config.diagnostics.probe_timeout);
    let client = ReqwestClient::with_timeout(timeout)
        .map_err(|e| CliError::Config(e.to_string()))?;
    let probe = DiagnosticsProbe::new(Arc::new(client)).with_timeout(timeout);

    println!("Probing {}", style_url);
    println!();
    let entries = runner.block_on(probe.run(&style_url));

    let width = entries.iter().map(|e| e.label.len()).max().unwrap_or(0);
    for entry in &entries {
        let marker = if entry.is_ok() { "✓" } else { "✗" };
        println!(
            "  {} {:<width$}  {}",
            marker,
            entry.label,
            entry.status,
            width = width
        );
    }

    let failed = entries.iter().filter(|e| !e.is_ok()).count();
    println!();
    if failed == 0 {
        println!("All {} checks passed.", entries.len());
    } else {
        println!("{} of {} checks failed.", failed, entries.len());
    }
    Ok(())
}
