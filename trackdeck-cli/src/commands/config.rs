//! `config get|set|list|path` commands.

use clap::Subcommand;
use trackdeck::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one value
    Get {
        /// Key as section.key (e.g. feed.refresh_interval)
        key: String,
    },

    /// Change one value and save the file
    Set {
        /// Key as section.key (e.g. map.bootstrap_deadline)
        key: String,

        /// New value
        value: String,
    },

    /// Print every setting, grouped by section
    List,

    /// Print the configuration file path
    Path,
}

pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => {
            let key = parse_key(&key)?;
            let config = ConfigFile::load().unwrap_or_default();
            println!("{}", display_value(&key.get(&config)));
        }
        ConfigCommands::Set { key, value } => {
            let key = parse_key(&key)?;
            let mut config = ConfigFile::load().unwrap_or_default();
            key.set(&mut config, &value)
                .map_err(|e| CliError::Config(e.to_string()))?;
            config.save()?;
            println!("{} = {}", key, key.get(&config));
        }
        ConfigCommands::List => print_all(&ConfigFile::load().unwrap_or_default()),
        ConfigCommands::Path => println!("{}", config_file_path().display()),
    }
    Ok(())
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Run 'trackdeck config list' for the available keys.",
            key
        ))
    })
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

fn print_all(config: &ConfigFile) {
    let width = ConfigKey::all()
        .iter()
        .map(|k| k.key_name().len())
        .max()
        .unwrap_or(0);

    let mut section = "";
    for key in ConfigKey::all() {
        if key.section() != section {
            if !section.is_empty() {
                println!();
            }
            section = key.section();
            println!("[{}]", section);
        }
        println!(
            "  {:<width$} = {}",
            key.key_name(),
            display_value(&key.get(config)),
            width = width
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("map.max_points").unwrap(), ConfigKey::MapMaxPoints);
        assert!(matches!(parse_key("map.nope"), Err(CliError::Config(_))));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(""), "(not set)");
        assert_eq!(display_value("10"), "10");
    }
}
