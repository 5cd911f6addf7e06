//! Session cache stored as a JSON file.
//!
//! Default location is the platform config directory:
//! - Linux: ~/.config/hts-classify/session.json
//! - macOS: ~/Library/Application Support/hts-classify/session.json
//! - Windows: %APPDATA%/hts-classify/session.json

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hts_application::{PersistedSession, SessionCache, SessionCacheError};
use tokio::fs;
use tracing::debug;

/// Directory name under the platform config directory.
const APP_DIR: &str = "hts-classify";

/// File name of the cached session.
const SESSION_FILE: &str = "session.json";

/// Session cache backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionCache {
    path: PathBuf,
}

impl FileSessionCache {
    /// Creates a cache stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a cache at the platform default location.
    ///
    /// # Errors
    ///
    /// Returns [`SessionCacheError::NoLocation`] if the platform has no config
    /// directory.
    pub fn at_default_location() -> Result<Self, SessionCacheError> {
        Self::default_path()
            .map(Self::new)
            .ok_or(SessionCacheError::NoLocation)
    }

    /// The platform default cache path, if one exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SESSION_FILE))
    }

    /// The file this cache reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(unix)]
    async fn restrict_permissions(&self) -> Result<(), SessionCacheError> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn restrict_permissions(&self) -> Result<(), SessionCacheError> {
        Ok(())
    }
}

#[async_trait]
impl SessionCache for FileSessionCache {
    async fn load(&self) -> Result<Option<PersistedSession>, SessionCacheError> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let session = serde_json::from_slice(&content)
            .map_err(|e| SessionCacheError::Serialization(e.to_string()))?;
        Ok(Some(session))
    }

    async fn save(&self, session: &PersistedSession) -> Result<(), SessionCacheError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let mut content = serde_json::to_vec_pretty(session)
            .map_err(|e| SessionCacheError::Serialization(e.to_string()))?;
        content.push(b'\n');

        fs::write(&self.path, content).await?;
        self.restrict_permissions().await?;
        debug!(path = %self.path.display(), "Session cached");
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionCacheError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session cache removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
