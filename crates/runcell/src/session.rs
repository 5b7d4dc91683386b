//! Per-request session directories
//!
//! Each request gets a fresh directory named by a v4 UUID under the work
//! root. The directory is created only after validation passes and removed
//! when the request ends.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::types::ExecutionStatus;

/// Errors from session directory handling
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to create session directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove session directory {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// ID minted, no directory yet
    Created,
    /// Content rules are being checked
    Validating,
    /// Content rules rejected the code; terminal, no directory was created
    Rejected,
    /// Content rules passed
    Validated,
    /// Directory exists and the pipeline is running
    Running,
    /// Pipeline finished with the given status
    Finished(ExecutionStatus),
    /// Directory removed
    Cleaned,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Finished(status) => write!(f, "finished ({})", status.label()),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}

/// A single request's isolated working directory
///
/// # Cleanup
///
/// Call [`cleanup()`](Self::cleanup) when the request is done. If a
/// materialized session is dropped without it (a panic in the pipeline, or
/// the request future being dropped), `Drop` removes the directory
/// synchronously and logs a warning.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    work_dir: PathBuf,
    language: String,
    created_at: SystemTime,
    state: SessionState,
    materialized: bool,
}

impl Session {
    /// Mint a session under `root`; the directory is not created yet
    pub fn new(root: impl AsRef<Path>, language: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            work_dir: root.as_ref().join(id.to_string()),
            language: language.into(),
            created_at: SystemTime::now(),
            state: SessionState::Created,
            materialized: false,
        }
    }

    /// Get the session ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the session directory
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Get the language ID this session runs
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check whether the directory currently exists on disk (as far as we know)
    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    pub(crate) fn transition(&mut self, next: SessionState) {
        debug!(session = %self.id, from = %self.state, to = %next, "session state");
        self.state = next;
    }

    /// Create the session directory
    ///
    /// Fails if the directory already exists; sessions never share a directory.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn materialize(&mut self) -> Result<(), SessionError> {
        let create_err = |source| SessionError::Create {
            path: self.work_dir.clone(),
            source,
        };

        if let Some(root) = self.work_dir.parent() {
            tokio::fs::create_dir_all(root).await.map_err(create_err)?;
        }

        let mut builder = tokio::fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(0o700);
        builder.create(&self.work_dir).await.map_err(create_err)?;

        self.materialized = true;
        debug!(work_dir = %self.work_dir.display(), "session directory created");
        Ok(())
    }

    /// Get the host path to a file inside the session directory
    ///
    /// Returns an error if the path contains path traversal attempts.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, SessionError> {
        if name.is_empty() || name.contains("..") || name.starts_with('/') {
            return Err(SessionError::InvalidPath(format!(
                "path traversal not allowed: {name}"
            )));
        }
        Ok(self.work_dir.join(name))
    }

    /// Write a file into the session directory
    #[instrument(skip(self, content), fields(session = %self.id))]
    pub async fn write_file(&self, name: &str, content: &[u8]) -> Result<(), SessionError> {
        let path = self.file_path(name)?;
        tokio::fs::write(&path, content).await?;
        debug!(?path, len = content.len(), "wrote file to session");
        Ok(())
    }

    /// Check if a file exists in the session directory
    pub async fn file_exists(&self, name: &str) -> Result<bool, SessionError> {
        let path = self.file_path(name)?;
        Ok(tokio::fs::metadata(&path).await.is_ok())
    }

    /// Remove the session directory
    ///
    /// A directory that is already gone counts as cleaned.
    #[must_use = "cleanup errors should be handled"]
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn cleanup(&mut self) -> Result<(), SessionError> {
        if self.materialized {
            match tokio::fs::remove_dir_all(&self.work_dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(SessionError::Cleanup {
                        path: self.work_dir.clone(),
                        source,
                    });
                }
            }
            self.materialized = false;
            debug!("session directory removed");
        }
        self.transition(SessionState::Cleaned);
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.materialized {
            warn!(
                session = %self.id,
                work_dir = %self.work_dir.display(),
                "Session dropped without explicit cleanup, removing directory"
            );
            if let Err(e) = std::fs::remove_dir_all(&self.work_dir)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                warn!(session = %self.id, error = %e, "best-effort session cleanup failed");
            }
        }
    }
}
