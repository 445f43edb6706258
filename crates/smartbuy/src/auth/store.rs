use super::{AuthError, Credentials};

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub trait CredentialStore {
    fn load(&self) -> Result<Option<Credentials>, AuthError>;
    fn save(&self, credentials: &Credentials) -> Result<(), AuthError>;
}

/// Keeps credentials in a single JSON file that is rewritten on every save.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> AuthError {
        AuthError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, AuthError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let credentials = serde_json::from_slice(&bytes).map_err(AuthError::CorruptCache)?;
        log::debug!("Loaded cached credentials from {}", self.path.display());
        Ok(Some(credentials))
    }

    fn save(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let bytes = serde_json::to_vec_pretty(credentials).map_err(AuthError::CorruptCache)?;
        fs::write(&self.path, bytes).map_err(|e| self.io_error(e))?;
        log::debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }
}
