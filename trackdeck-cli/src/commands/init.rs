//! `init`: write a configuration file with the default settings.

use trackdeck::config::{config_file_path, ConfigFile};

use crate::error::CliError;

pub fn run(force: bool) -> Result<(), CliError> {
    let path = config_file_path();

    let config = if path.exists() && !force {
        println!("Keeping existing configuration (use --force to reset it).");
        ConfigFile::load()?
    } else {
        ConfigFile::default()
    };
    config.save()?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("  Feed:      {} ({})", config.feed.base_url, config.feed.mode);
    println!("  Style:     {}", config.map.style_url);
    println!("  Fallback:  {}", config.map.fallback_tile_url);
    println!();
    println!("Edit this file or use 'trackdeck config set' to change settings.");
    println!("Command line arguments override config file values.");
    Ok(())
}
