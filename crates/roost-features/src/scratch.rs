// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scratch area for staged capture media.
//!
//! Captured media is written here before being forwarded. The area is
//! bounded by aggregate size, not per-entry TTL: once the total exceeds the
//! configured cap (default 100MB), the oldest files are deleted until the
//! total fits again.

use std::path::{Path, PathBuf};

use roost_core::FleetError;
use tracing::{debug, warn};

fn io_err(e: std::io::Error) -> FleetError {
    FleetError::Storage {
        source: Box::new(e),
    }
}

/// Size-bounded staging directory.
pub struct ScratchArea {
    dir: PathBuf,
    max_bytes: u64,
}

impl ScratchArea {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` to a fresh file and sweep if the cap is now exceeded.
    pub async fn stage(
        &self,
        bot_id: &str,
        name_hint: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, FleetError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;

        let hint: String = name_hint
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .take(48)
            .collect();
        let path = self
            .dir
            .join(format!("{bot_id}-{}-{hint}", uuid::Uuid::new_v4()));

        tokio::fs::write(&path, bytes).await.map_err(io_err)?;
        debug!(path = %path.display(), size = bytes.len(), "staged media");

        self.sweep_if_over().await?;
        Ok(path)
    }

    /// Read a staged file back.
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, FleetError> {
        tokio::fs::read(path).await.map_err(io_err)
    }

    /// Best-effort removal of a staged file.
    pub async fn remove(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            debug!(path = %path.display(), error = %e, "scratch file already gone");
        }
    }

    /// Aggregate size of all staged files.
    pub async fn total_bytes(&self) -> Result<u64, FleetError> {
        let mut total = 0u64;
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(io_err(e)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let meta = entry.metadata().await.map_err(io_err)?;
            if meta.is_file() {
                total += meta.len();
            }
        }
        Ok(total)
    }

    /// Delete oldest files until the aggregate fits under the cap.
    ///
    /// Returns the number of files deleted.
    pub async fn sweep_if_over(&self) -> Result<usize, FleetError> {
        let mut total = self.total_bytes().await?;
        if total <= self.max_bytes {
            return Ok(0);
        }

        // Collect (modified, size, path) and delete oldest-first.
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_err)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let meta = entry.metadata().await.map_err(io_err)?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().map_err(io_err)?;
            files.push((modified, meta.len(), entry.path()));
        }
        files.sort_by_key(|(modified, _, _)| *modified);

        let mut deleted = 0;
        for (_, size, path) in files {
            if total <= self.max_bytes {
                break;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    total = total.saturating_sub(size);
                    deleted += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "scratch sweep failed"),
            }
        }
        if deleted > 0 {
            debug!(deleted, remaining_bytes = total, "scratch area swept");
        }
        Ok(deleted)
    }
}
