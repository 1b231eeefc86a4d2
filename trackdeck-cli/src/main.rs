//! trackdeck CLI - live flight and ship tracking in the terminal
//!
//! This binary is a thin front end over the `trackdeck` library: argument
//! parsing here, one module per command under `commands/`.

mod commands;
mod error;
mod runner;
mod tui_app;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::common::SessionArgs;
use commands::config::ConfigCommands;
use commands::export::ExportArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "trackdeck")]
#[command(version, about = "Live flight and ship tracking dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the live dashboard
    Run {
        #[command(flatten)]
        session: SessionArgs,

        /// Print status lines instead of drawing the dashboard
        #[arg(long)]
        headless: bool,
    },

    /// Print the status report on every refresh
    Watch {
        #[command(flatten)]
        session: SessionArgs,

        /// Stop after this many reports
        #[arg(long)]
        count: Option<u64>,

        /// Probe the map resources once at startup
        #[arg(long)]
        diagnostics: bool,
    },

    /// Check that the map style and its resources are reachable
    Probe {
        /// Style URL (defaults to the configured style)
        #[arg(long)]
        style: Option<String>,
    },

    /// Render the current snapshot to a PNG file
    Export {
        #[command(flatten)]
        session: SessionArgs,

        /// Output file
        #[arg(short, long, default_value = "trackdeck.png")]
        out: PathBuf,

        /// Image width in pixels (defaults to map.width)
        #[arg(long)]
        width: Option<u32>,

        /// Image height in pixels (defaults to map.height)
        #[arg(long)]
        height: Option<u32>,

        /// Fit the camera to the rendered points
        #[arg(long)]
        fit: bool,

        /// Seconds to wait for the engine and the first snapshot
        #[arg(long)]
        wait: Option<u64>,
    },

    /// Read or change configuration values
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Store the feed access token
    Login {
        /// Token value (prompted for when omitted)
        #[arg(long)]
        token: Option<String>,
    },

    /// Remove the stored feed access token
    Logout,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn dispatch(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Run { session, headless } => commands::run::run(session, headless),
        Commands::Watch {
            session,
            count,
            diagnostics,
        } => commands::watch::run(session, count, diagnostics),
        Commands::Probe { style } => commands::probe::run(style),
        Commands::Export {
            session,
            out,
            width,
            height,
            fit,
            wait,
        } => commands::export::run(ExportArgs {
            session,
            out,
            width,
            height,
            fit,
            wait,
        }),
        Commands::Config { command } => commands::config::run(command),
        Commands::Init { force } => commands::init::run(force),
        Commands::Login { token } => commands::login::login(token),
        Commands::Logout => commands::login::logout(),
    }
}
