use storage_types::{LogicalVolumeState, PhysicalVolumeRef, VolumeGroupState};

pub const MIB: u64 = 1024 * 1024;

/// Default LVM extent size
pub const EXTENT_SIZE: u64 = 4 * MIB;

/// Empty group with `extent_count` extents, all free, on one PV
pub fn group(name: &str, extent_count: u64) -> VolumeGroupState {
    VolumeGroupState {
        name: name.to_string(),
        extent_size: EXTENT_SIZE,
        extent_count,
        free_extents: extent_count,
        physical_volumes: vec![PhysicalVolumeRef {
            device: format!("/dev/{}-pv0", name),
            size: extent_count * EXTENT_SIZE,
            free: extent_count * EXTENT_SIZE,
        }],
        logical_volumes: Vec::new(),
    }
}

/// Add a logical volume of `extents` extents, taken from the free pool
pub fn with_volume(mut group: VolumeGroupState, name: &str, extents: u64) -> VolumeGroupState {
    group.free_extents = group.free_extents.saturating_sub(extents);
    group.logical_volumes.push(LogicalVolumeState {
        name: name.to_string(),
        size: extents * group.extent_size,
        device_path: format!("/dev/{}/{}", group.name, name),
    });
    group
}

/// Override the free extent count, growing the group if needed
pub fn with_free(mut group: VolumeGroupState, free_extents: u64) -> VolumeGroupState {
    let used: u64 = group
        .logical_volumes
        .iter()
        .map(|lv| lv.size / group.extent_size)
        .sum();
    group.free_extents = free_extents;
    group.extent_count = used + free_extents;
    group
}

pub fn without_physical_volumes(mut group: VolumeGroupState) -> VolumeGroupState {
    group.physical_volumes.clear();
    group
}

pub fn with_physical_volume(mut group: VolumeGroupState, device: &str) -> VolumeGroupState {
    group.physical_volumes.push(PhysicalVolumeRef {
        device: device.to_string(),
        size: 0,
        free: 0,
    });
    group
}
