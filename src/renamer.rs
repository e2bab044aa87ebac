// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Moves a fully uploaded CSV out of the pending name.
//!
//! The file is renamed within its own directory to `{prefix}{n}{ext}` where
//! `n` is the smallest positive integer not already taken, e.g.
//! `data.csv` → `Uploaded_3.csv`.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum RenameError {
    #[error("cannot rename '{0}': file not found")]
    SourceMissing(PathBuf),
    #[error("failed to rename '{from}' to '{to}': {source}")]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct FileRenamer {
    prefix: String,
}

impl Default for FileRenamer {
    fn default() -> Self {
        Self::new("Uploaded_")
    }
}

impl FileRenamer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The path `rename` would move `path` to right now.
    #[must_use]
    pub fn next_name(&self, path: &Path) -> PathBuf {
        let directory = path.parent().unwrap_or_else(|| Path::new(""));
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        (1u64..)
            .map(|n| directory.join(format!("{}{}{}", self.prefix, n, extension)))
            .find(|candidate| !candidate.exists())
            .unwrap_or_else(|| directory.join(format!("{}{}", self.prefix, extension)))
    }

    /// Move `path` to the next free numbered name and return the new path.
    pub fn rename(&self, path: &Path) -> Result<PathBuf, RenameError> {
        if !path.exists() {
            return Err(RenameError::SourceMissing(path.to_path_buf()));
        }
        let target = self.next_name(path);
        std::fs::rename(path, &target).map_err(|source| RenameError::Io {
            from: path.to_path_buf(),
            to: target.clone(),
            source,
        })?;
        info!(from = %path.display(), to = %target.display(), "Renamed processed CSV");
        Ok(target)
    }
}
