// SPDX-License-Identifier: GPL-3.0-only

use serde::Serialize;
use storage_contracts::StorageError;
use storage_types::{LogicalVolumeState, SizeSpec, VolumeGroupState};

/// Size token resolved against a group's extent size
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeTarget {
    AbsoluteExtents(u64),
    /// Left for LVM to resolve at execution time
    PoolRelative(String),
}

/// Whole extents covered by `bytes`, rounded down.
pub fn bytes_to_extents(bytes: u64, extent_size: u64) -> Result<u64, StorageError> {
    if extent_size == 0 {
        return Err(StorageError::infrastructure(
            "volume group reports an extent size of 0",
        ));
    }
    Ok(bytes / extent_size)
}

pub fn current_extents(
    volume: &LogicalVolumeState,
    group: &VolumeGroupState,
) -> Result<u64, StorageError> {
    bytes_to_extents(volume.size, group.extent_size)
}

pub fn resolve(size: &SizeSpec, extent_size: u64) -> Result<SizeTarget, StorageError> {
    match size {
        SizeSpec::Sized { .. } => {
            let bytes = size.bytes().unwrap_or_default();
            Ok(SizeTarget::AbsoluteExtents(bytes_to_extents(
                bytes,
                extent_size,
            )?))
        }
        SizeSpec::Extents(extents) => Ok(SizeTarget::AbsoluteExtents(*extents)),
        SizeSpec::PoolRelative(raw) => Ok(SizeTarget::PoolRelative(raw.clone())),
    }
}
