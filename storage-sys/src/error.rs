// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use storage_contracts::StorageError;
use thiserror::Error;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("required tool not found on PATH: {0}")]
    ToolNotFound(String),

    #[error("unexpected {tool} output: {line}")]
    InvalidOutput { tool: String, line: String },

    #[error("invalid mountinfo line: {0}")]
    InvalidMountInfoLine(String),
}

impl SysError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<SysError> for StorageError {
    fn from(err: SysError) -> Self {
        StorageError::infrastructure(err.to_string())
    }
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
