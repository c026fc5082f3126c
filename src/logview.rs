use crate::error::LogError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

pub const EMPTY_LOG_MESSAGE: &str = "No log entries found";
pub const READ_FAILED_MESSAGE: &str = "Error reading log file or file is empty";
pub const CLEARED_MESSAGE: &str = "Log cleared";
pub const SEED_MESSAGE: &str = "No log found";

/// Newest-first view over the relay's append-only log file
#[derive(Debug, Clone)]
pub struct LogView {
    path: PathBuf,
}

impl LogView {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file contents
    pub async fn read(&self) -> Result<String, LogError> {
        fs::read_to_string(&self.path)
            .await
            .map_err(|source| LogError::ReadFailed {
                path: self.path.display().to_string(),
                source,
            })
    }

    /// Lines newest first, or a placeholder when the log is empty or unreadable
    pub async fn read_reversed(&self) -> String {
        match self.read().await {
            Ok(contents) => {
                let trimmed = contents.trim();
                if trimmed.is_empty() {
                    return EMPTY_LOG_MESSAGE.to_string();
                }
                trimmed.lines().rev().collect::<Vec<_>>().join("\n")
            }
            Err(e) => {
                warn!("{}", e);
                READ_FAILED_MESSAGE.to_string()
            }
        }
    }

    /// Truncate the log, leaving a single marker line
    pub async fn clear(&self) -> Result<(), LogError> {
        self.write(&format!("{}\n", CLEARED_MESSAGE)).await?;
        info!("Cleared log {}", self.path.display());
        Ok(())
    }

    /// Seed the log with a placeholder line when the file does not exist.
    /// Returns true if the file was created.
    pub async fn ensure_exists(&self) -> Result<bool, LogError> {
        match fs::metadata(&self.path).await {
            Ok(_) => Ok(false),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|source| LogError::WriteFailed {
                            path: parent.display().to_string(),
                            source,
                        })?;
                }
                self.write(&format!("{}\n", SEED_MESSAGE)).await?;
                debug!("Seeded missing log {}", self.path.display());
                Ok(true)
            }
            Err(source) => Err(LogError::ReadFailed {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }

    async fn write(&self, contents: &str) -> Result<(), LogError> {
        fs::write(&self.path, contents)
            .await
            .map_err(|source| LogError::WriteFailed {
                path: self.path.display().to_string(),
                source,
            })
    }
}
