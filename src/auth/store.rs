use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use time::OffsetDateTime;

use crate::auth::session::AuthSession;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("failed to access session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persists the signed-in session between runs of the CLI.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, idle_timeout: Duration) -> Self {
        Self { path: path.into(), idle_timeout }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored session, or `None` when there is none or it has idled out. An
    /// expired session is removed from disk. Loading counts as activity.
    pub fn load(&self, now: OffsetDateTime) -> Result<Option<AuthSession>, SessionStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SessionStoreError::Io { path: self.path.clone(), source }),
        };

        let mut session: AuthSession = serde_json::from_str(&raw)
            .map_err(|source| SessionStoreError::Corrupt { path: self.path.clone(), source })?;

        if session.is_expired(now, self.idle_timeout) {
            tracing::info!(path = %self.path.display(), "Stored session idled out; signing out");
            self.clear()?;
            return Ok(None);
        }

        session.touch(now);
        self.save(&session)?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &AuthSession) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| SessionStoreError::Io { path: parent.to_path_buf(), source })?;
        }

        let payload = serde_json::to_string_pretty(session)
            .map_err(|source| SessionStoreError::Corrupt { path: self.path.clone(), source })?;
        fs::write(&self.path, payload)
            .map_err(|source| SessionStoreError::Io { path: self.path.clone(), source })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            if let Err(err) = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)) {
                tracing::warn!(
                    error = %err,
                    path = %self.path.display(),
                    "Failed to restrict session file permissions"
                );
            }
        }

        Ok(())
    }

    pub fn clear(&self) -> Result<(), SessionStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionStoreError::Io { path: self.path.clone(), source }),
        }
    }
}
