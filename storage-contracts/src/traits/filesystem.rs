// SPDX-License-Identifier: GPL-3.0-only

use storage_types::MountSpec;

use crate::StorageError;

pub trait FilesystemProbe: Send + Sync {
    /// Filesystem type found on `device`, `None` when unformatted
    fn detect_filesystem_type(&self, device: &str) -> Result<Option<String>, StorageError>;
}

pub trait FilesystemOps: Send + Sync {
    fn is_mounted(&self, device: &str) -> Result<bool, StorageError>;

    fn ensure_directory(&self, path: &str) -> Result<(), StorageError>;

    /// Mount `device` and enable it at boot. Returns whether anything changed.
    fn mount(
        &self,
        device: &str,
        mount: &MountSpec,
        fs_type: Option<&str>,
    ) -> Result<bool, StorageError>;
}
