// ── Durable token stores ──
//
// `TokenStore` implementations backing `scadalink_core::Session`. Each
// holds exactly one token under a per-profile key.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use scadalink_core::{CoreError, TokenStore};

use crate::ConfigError;

const KEYRING_SERVICE: &str = "scadalink";

fn storage_error(err: impl std::fmt::Display) -> CoreError {
    CoreError::Storage {
        message: err.to_string(),
    }
}

// ── Keyring ─────────────────────────────────────────────────────────

/// Token stored in the system keyring as `scadalink` / `{profile}/session-token`.
pub struct KeyringTokenStore {
    entry: keyring::Entry,
}

impl KeyringTokenStore {
    pub fn new(profile_name: &str) -> Result<Self, ConfigError> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/session-token"))
            .map_err(|e| ConfigError::TokenStore(e.to_string()))?;
        Ok(Self { entry })
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<SecretString>, CoreError> {
        match self.entry.get_password() {
            Ok(token) => Ok(Some(SecretString::from(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(storage_error(e)),
        }
    }

    fn save(&self, token: &SecretString) -> Result<(), CoreError> {
        self.entry
            .set_password(token.expose_secret())
            .map_err(storage_error)
    }

    fn clear(&self) -> Result<(), CoreError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }
}

// ── File ────────────────────────────────────────────────────────────

/// Token stored as a single-line file, owner-readable only on unix.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/tokens/<profile>.token`.
    pub fn for_profile(profile_name: &str) -> Self {
        Self::new(crate::token_dir().join(format!("{profile_name}.token")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<SecretString>, CoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(SecretString::from(token.to_owned())))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(e)),
        }
    }

    fn save(&self, token: &SecretString) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(storage_error)?;
        }
        std::fs::write(&self.path, token.expose_secret()).map_err(storage_error)?;
        restrict_permissions(&self.path)?;
        debug!(path = %self.path.display(), "session token written");
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(storage_error)
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}
