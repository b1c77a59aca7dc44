//! LVM (Logical Volume Manager) state types
//!
//! Snapshots of volume groups, logical volumes and physical volumes as
//! reported by the storage engine at query time.

use serde::{Deserialize, Serialize};

/// Volume group state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeGroupState {
    /// Volume group name
    pub name: String,

    /// Size of one physical extent in bytes, always > 0 for an existing group
    pub extent_size: u64,

    /// Total number of extents in the group
    pub extent_count: u64,

    /// Number of unallocated extents
    pub free_extents: u64,

    /// Physical volumes, in engine order
    pub physical_volumes: Vec<PhysicalVolumeRef>,

    /// Logical volumes, in engine order
    pub logical_volumes: Vec<LogicalVolumeState>,
}

impl VolumeGroupState {
    /// Find a logical volume of this group by name
    pub fn logical_volume(&self, name: &str) -> Option<&LogicalVolumeState> {
        self.logical_volumes.iter().find(|lv| lv.name == name)
    }

    /// Free space in bytes
    pub fn free_bytes(&self) -> u64 {
        self.free_extents.saturating_mul(self.extent_size)
    }

    /// Total size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.extent_count.saturating_mul(self.extent_size)
    }
}

/// Logical volume state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalVolumeState {
    /// Logical volume name, unique within its group
    pub name: String,

    /// Size in bytes
    pub size: u64,

    /// Device path (e.g., "/dev/vg0/lv0")
    pub device_path: String,
}

/// Physical volume belonging to a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalVolumeRef {
    /// Device path (e.g., "/dev/sda1")
    pub device: String,

    /// Total size in bytes
    pub size: u64,

    /// Free space in bytes
    pub free: u64,
}

/// Escape a group or volume name for use in a device-mapper node name.
///
/// Device mapper doubles every hyphen so the separator between group and
/// volume in `/dev/mapper/<vg>-<lv>` stays unambiguous.
pub fn to_dm_name(name: &str) -> String {
    name.replace('-', "--")
}
