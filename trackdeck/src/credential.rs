//! Feed credential storage and lookup.
//!
//! The credential is an opaque bearer token. It is looked up in order from
//! the persisted token file (`~/.trackdeck/credential`) and then the
//! `TRACKDECK_TOKEN` environment variable. A missing credential is not an
//! error; the feed is simply contacted anonymously.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::config::config_directory;

/// Environment variable consulted when no token file exists.
pub const CREDENTIAL_ENV_VAR: &str = "TRACKDECK_TOKEN";

/// File name of the persisted token inside the config directory.
const CREDENTIAL_FILE_NAME: &str = "credential";

/// Errors from reading or writing the token file.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential is empty")]
    Empty,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An opaque bearer token.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token, rejecting blank input.
    pub fn new(token: impl Into<String>) -> Result<Self, CredentialError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(CredentialError::Empty);
        }
        Ok(Self(token))
    }

    /// The raw token.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    File,
    Environment,
}

/// The persisted token file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.trackdeck/credential`.
    pub fn default_location() -> Self {
        Self::new(config_directory().join(CREDENTIAL_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored token, if any.
    pub fn load(&self) -> Result<Option<Credential>, CredentialError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Credential::new(content).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CredentialError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Persist a token, replacing any previous one.
    pub fn save(&self, credential: &Credential) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CredentialError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&self.path, credential.expose()).map_err(|source| CredentialError::Io {
            path: self.path.clone(),
            source,
        })?;
        restrict_permissions(&self.path);
        Ok(())
    }

    /// Remove the stored token. Returns whether a token was present.
    pub fn clear(&self) -> Result<bool, CredentialError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CredentialError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        debug!(path = %path.display(), error = %e, "Could not restrict credential permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

/// Resolve the credential from the store, then from `env_value`.
///
/// `env_value` is normally `std::env::var(CREDENTIAL_ENV_VAR).ok()`; it is a
/// parameter so callers and tests control the environment.
pub fn resolve_credential(
    store: &CredentialStore,
    env_value: Option<String>,
) -> Option<(Credential, CredentialOrigin)> {
    match store.load() {
        Ok(Some(credential)) => return Some((credential, CredentialOrigin::File)),
        Ok(None) => {}
        Err(e) => debug!(error = %e, "Ignoring unreadable credential file"),
    }

    env_value
        .and_then(|value| Credential::new(value).ok())
        .map(|credential| (credential, CredentialOrigin::Environment))
}

/// Resolve the credential from the default store and the process environment.
pub fn resolve_default_credential() -> Option<Credential> {
    resolve_credential(
        &CredentialStore::default_location(),
        std::env::var(CREDENTIAL_ENV_VAR).ok(),
    )
    .map(|(credential, origin)| {
        debug!(origin = ?origin, "Resolved feed credential");
        credential
    })
}
