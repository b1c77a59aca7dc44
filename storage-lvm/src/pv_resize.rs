// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{CommandRunner, StorageError, VolumeQuery};
use storage_types::DesiredVolumeSpec;
use tracing::debug;

use crate::emitter::pvresize_command;
use crate::exec::execute;

/// Resize every physical volume of the spec's group so grown devices show
/// up as free extents. Returns the number of volumes resized.
///
/// Skipped when resizing is disabled, when the group is missing (the
/// decision step reports that) or when it has no physical volumes. The
/// first failing `pvresize` aborts the pass.
pub fn resize_physical_volumes(
    query: &dyn VolumeQuery,
    runner: &dyn CommandRunner,
    spec: &DesiredVolumeSpec,
) -> Result<usize, StorageError> {
    if !spec.resize {
        debug!(
            "Skipping physical volume resize for {}: resize disabled",
            spec.display_name()
        );
        return Ok(0);
    }

    let Some(group) = query.get_volume_group(&spec.group)? else {
        return Ok(0);
    };

    for pv in &group.physical_volumes {
        debug!("Resizing physical volume {}", pv.device);
        execute(runner, &pvresize_command(&pv.device))?;
    }

    Ok(group.physical_volumes.len())
}
