// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use storage_types::SizeParseError;
use thiserror::Error;

/// Coarse error class, used for exit codes and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageErrorKind {
    Configuration,
    NotFound,
    Capacity,
    Infrastructure,
    Execution,
}

impl StorageErrorKind {
    /// Process exit code (sysexits.h) for a run that failed with this kind
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Configuration => 78,
            Self::NotFound => 69,
            Self::Capacity => 73,
            Self::Infrastructure => 71,
            Self::Execution => 70,
        }
    }
}

/// Failure of one reconciliation pass. Every variant aborts the pass.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StorageError {
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    #[error("unsupported size form for extend: '{token}' on {volume}")]
    UnsupportedExtendSize { volume: String, token: String },

    #[error("group does not exist: {group}")]
    GroupNotFound { group: String },

    #[error(
        "requested extend exceeds volume group capacity: {volume} needs {needed} more extents, {group} has {free} free"
    )]
    Capacity {
        group: String,
        volume: String,
        needed: u64,
        free: u64,
    },

    #[error("storage engine failure: {message}")]
    Infrastructure { message: String },

    #[error("command `{command}` exited with status {exit_code}: {stderr}")]
    Execution {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
}

impl StorageError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::Infrastructure {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> StorageErrorKind {
        match self {
            Self::Configuration { .. } | Self::UnsupportedExtendSize { .. } => {
                StorageErrorKind::Configuration
            }
            Self::GroupNotFound { .. } => StorageErrorKind::NotFound,
            Self::Capacity { .. } => StorageErrorKind::Capacity,
            Self::Infrastructure { .. } => StorageErrorKind::Infrastructure,
            Self::Execution { .. } => StorageErrorKind::Execution,
        }
    }
}

impl From<SizeParseError> for StorageError {
    fn from(err: SizeParseError) -> Self {
        Self::configuration(err.to_string())
    }
}
