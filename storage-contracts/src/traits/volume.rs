// SPDX-License-Identifier: GPL-3.0-only

use storage_types::VolumeGroupState;

use crate::StorageError;

/// Read-only view of the storage engine.
///
/// Implementations query live metadata on every call and never cache.
pub trait VolumeQuery: Send + Sync {
    fn list_volume_groups(&self) -> Result<Vec<VolumeGroupState>, StorageError>;

    /// `Ok(None)` means the group does not exist; query failures are `Err`.
    fn get_volume_group(&self, name: &str) -> Result<Option<VolumeGroupState>, StorageError> {
        Ok(self
            .list_volume_groups()?
            .into_iter()
            .find(|group| group.name == name))
    }
}
