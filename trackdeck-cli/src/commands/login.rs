//! `login` and `logout`: manage the persisted feed credential.

use std::io::{self, BufRead, Write};

use trackdeck::credential::{Credential, CredentialStore, CREDENTIAL_ENV_VAR};

use crate::error::CliError;

pub fn login(token: Option<String>) -> Result<(), CliError> {
    let token = match token {
        Some(token) => token,
        None => prompt_token()?,
    };
    let credential = Credential::new(token)?;

    let store = CredentialStore::default_location();
    store.save(&credential)?;

    println!("Credential saved to {}", store.path().display());
    Ok(())
}

pub fn logout() -> Result<(), CliError> {
    let store = CredentialStore::default_location();
    if store.clear()? {
        println!("Removed {}", store.path().display());
    } else {
        println!("No stored credential.");
    }
    if std::env::var_os(CREDENTIAL_ENV_VAR).is_some() {
        println!("Note: {} is still set in the environment.", CREDENTIAL_ENV_VAR);
    }
    Ok(())
}

fn prompt_token() -> Result<String, CliError> {
    print!("Feed access token: ");
    io::stdout().flush().map_err(CliError::Terminal)?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(CliError::Terminal)?;
    Ok(line.trim().to_string())
}
