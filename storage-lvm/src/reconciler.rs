// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use serde::Serialize;
use storage_contracts::{
    CommandLine, CommandRunner, FilesystemOps, FilesystemProbe, StorageError, VolumeQuery,
};
use storage_types::{DesiredVolumeSpec, MountSpec, SizeSpec};
use tracing::{debug, info, warn};

use crate::decision::{Action, decide};
use crate::emitter::{create_command, extend_command, format_command, pvresize_command};
use crate::exec::execute;
use crate::pv_resize::resize_physical_volumes;
use crate::validate::validate;

/// Result of a successful [`Reconciler::converge`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub volume: String,
    pub action: Action,
    /// Whether a create, extend, format or mount was performed
    pub changed: bool,
    pub device_path: String,
    pub resized_physical_volumes: usize,
}

/// Commands a pass would run against the current state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub volume: String,
    pub physical_volume_resizes: Vec<CommandLine>,
    pub action: Action,
    pub command: Option<CommandLine>,
    pub format: Option<CommandLine>,
    pub mount: Option<MountSpec>,
}

impl Plan {
    pub fn commands(&self) -> impl Iterator<Item = &CommandLine> {
        self.physical_volume_resizes
            .iter()
            .chain(self.command.iter())
            .chain(self.format.iter())
    }
}

/// Single entry point for converging declared volumes.
///
/// Holds no engine state between calls: every pass re-reads the group.
pub struct Reconciler {
    query: Arc<dyn VolumeQuery>,
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn FilesystemProbe>,
    filesystems: Arc<dyn FilesystemOps>,
}

impl Reconciler {
    pub fn new(
        query: Arc<dyn VolumeQuery>,
        runner: Arc<dyn CommandRunner>,
        probe: Arc<dyn FilesystemProbe>,
        filesystems: Arc<dyn FilesystemOps>,
    ) -> Self {
        Self {
            query,
            runner,
            probe,
            filesystems,
        }
    }

    /// Decide what [`converge`](Self::converge) would do, without running
    /// anything. Physical volume growth that a resize would reveal is not
    /// predicted.
    pub fn plan(&self, spec: &DesiredVolumeSpec) -> Result<Plan, StorageError> {
        let size = validate(spec)?;
        let group = self.query.get_volume_group(&spec.group)?;

        let physical_volume_resizes = match &group {
            Some(group) if spec.resize => group
                .physical_volumes
                .iter()
                .map(|pv| pvresize_command(&pv.device))
                .collect(),
            _ => Vec::new(),
        };

        let action = decide(spec, &size, group.as_ref())?;
        let command = self.command_for(spec, &size, &action);

        let device_path = spec.device_mapper_path();
        let format = match &spec.filesystem {
            Some(fs_type) if matches!(action, Action::Create) => {
                Some(format_command(&device_path, fs_type))
            }
            Some(fs_type) => self
                .needs_format(&device_path, fs_type)?
                .then(|| format_command(&device_path, fs_type)),
            None => None,
        };

        Ok(Plan {
            volume: spec.display_name(),
            physical_volume_resizes,
            action,
            command,
            format,
            mount: spec.mount_point.as_ref().map(|mount| mount.spec()),
        })
    }

    /// Converge the live state onto `spec`.
    ///
    /// Sub-steps are not transactional: a failure after a physical volume
    /// resize or a create leaves those changes in place.
    pub fn converge(&self, spec: &DesiredVolumeSpec) -> Result<Outcome, StorageError> {
        let size = validate(spec)?;
        let volume = spec.display_name();
        debug!("Reconciling logical volume {}", volume);

        let resized_physical_volumes =
            resize_physical_volumes(self.query.as_ref(), self.runner.as_ref(), spec)?;

        let group = self.query.get_volume_group(&spec.group)?;
        let action = decide(spec, &size, group.as_ref())?;

        let mut changed = false;
        match self.command_for(spec, &size, &action) {
            Some(command) => {
                execute(self.runner.as_ref(), &command)?;
                info!("Logical volume {}: {}", volume, action);
                changed = true;
            }
            None => debug!("Logical volume {}: {}", volume, action),
        }

        let device_path = spec.device_mapper_path();
        if let Some(fs_type) = &spec.filesystem {
            changed |= self.ensure_filesystem(&device_path, fs_type)?;
        }
        if let Some(mount_point) = &spec.mount_point {
            changed |= self.ensure_mounted(&device_path, &mount_point.spec(), spec)?;
        }

        Ok(Outcome {
            volume,
            action,
            changed,
            device_path,
            resized_physical_volumes,
        })
    }

    fn command_for(
        &self,
        spec: &DesiredVolumeSpec,
        size: &SizeSpec,
        action: &Action,
    ) -> Option<CommandLine> {
        match action {
            Action::Create => Some(create_command(spec, size)),
            Action::Extend {
                device_path,
                requested_extents,
                ..
            } => Some(extend_command(spec, device_path, *requested_extents)),
            Action::NoOp { .. } => None,
        }
    }

    fn needs_format(&self, device_path: &str, fs_type: &str) -> Result<bool, StorageError> {
        debug!("Checking to see if {} is formatted...", device_path);
        let existing = self.probe.detect_filesystem_type(device_path)?;
        debug!("Result of check: {:?}", existing);

        match existing {
            Some(existing) if existing.trim() == fs_type.trim() => Ok(false),
            Some(existing) => {
                warn!(
                    "{} holds a {} filesystem, it will be reformatted as {}",
                    device_path, existing, fs_type
                );
                Ok(true)
            }
            None => Ok(true),
        }
    }

    fn ensure_filesystem(&self, device_path: &str, fs_type: &str) -> Result<bool, StorageError> {
        if !self.needs_format(device_path, fs_type)? {
            return Ok(false);
        }

        execute(self.runner.as_ref(), &format_command(device_path, fs_type))?;
        info!("Formatted {} as {}", device_path, fs_type);
        Ok(true)
    }

    fn ensure_mounted(
        &self,
        device_path: &str,
        mount: &MountSpec,
        spec: &DesiredVolumeSpec,
    ) -> Result<bool, StorageError> {
        if !self.filesystems.is_mounted(device_path)? {
            self.filesystems.ensure_directory(&mount.location)?;
        }

        let changed = self
            .filesystems
            .mount(device_path, mount, spec.filesystem.as_deref())?;
        if changed {
            info!("Mounted {} on {}", device_path, mount.location);
        }
        Ok(changed)
    }
}

