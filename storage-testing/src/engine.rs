use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use storage_contracts::{
    CommandLine, CommandOutput, CommandRunner, FilesystemOps, FilesystemProbe, StorageError,
    VolumeQuery,
};
use storage_types::{LogicalVolumeState, MountSpec, SizeSpec, VolumeGroupState};
use tracing::debug;

#[derive(Debug, Default)]
struct EngineState {
    groups: BTreeMap<String, VolumeGroupState>,
    filesystems: BTreeMap<String, String>,
    mounts: BTreeMap<String, MountSpec>,
    directories: BTreeSet<String>,
    commands: Vec<CommandLine>,
    queries: usize,
    query_failure: Option<String>,
    failing_programs: BTreeMap<String, CommandOutput>,
    pv_growth: BTreeMap<String, u64>,
}

/// In-memory storage engine.
///
/// Supports `lvcreate`, `lvextend`, `pvresize` and `mkfs`; any other
/// program exits with status 127.
#[derive(Debug, Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(self, group: VolumeGroupState) -> Self {
        self.lock().groups.insert(group.name.clone(), group);
        self
    }

    /// Make every inventory query fail with `message`
    pub fn fail_queries(&self, message: &str) {
        self.lock().query_failure = Some(message.to_string());
    }

    /// Make every run of `program` exit with `exit_code` and `stderr`
    pub fn fail_program(&self, program: &str, exit_code: i32, stderr: &str) {
        self.lock().failing_programs.insert(
            program.to_string(),
            CommandOutput {
                stdout: String::new(),
                stderr: stderr.to_string(),
                exit_code,
            },
        );
    }

    /// The next `pvresize` of `device` adds `extents` free extents to its group
    pub fn grow_physical_volume(&self, device: &str, extents: u64) {
        self.lock().pv_growth.insert(device.to_string(), extents);
    }

    pub fn set_filesystem(&self, device: &str, fs_type: &str) {
        self.lock()
            .filesystems
            .insert(device.to_string(), fs_type.to_string());
    }

    pub fn set_mounted(&self, device: &str, mount: MountSpec) {
        self.lock().mounts.insert(device.to_string(), mount);
    }

    pub fn group(&self, name: &str) -> Option<VolumeGroupState> {
        self.lock().groups.get(name).cloned()
    }

    pub fn commands(&self) -> Vec<CommandLine> {
        self.lock().commands.clone()
    }

    pub fn commands_for(&self, program: &str) -> Vec<CommandLine> {
        self.lock()
            .commands
            .iter()
            .filter(|command| command.program == program)
            .cloned()
            .collect()
    }

    pub fn query_count(&self) -> usize {
        self.lock().queries
    }

    pub fn filesystem(&self, device: &str) -> Option<String> {
        self.lock().filesystems.get(device).cloned()
    }

    pub fn mount_of(&self, device: &str) -> Option<MountSpec> {
        self.lock().mounts.get(device).cloned()
    }

    pub fn directories(&self) -> Vec<String> {
        self.lock().directories.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EngineState {
    fn apply(&mut self, command: &CommandLine) -> CommandOutput {
        let result = match command.program.as_str() {
            "lvcreate" => self.lvcreate(command),
            "lvextend" => self.lvextend(command),
            "pvresize" => self.pvresize(command),
            "mkfs" => self.mkfs(command),
            other => Err((127, format!("{other}: command not found"))),
        };

        match result {
            Ok(stdout) => CommandOutput {
                stdout,
                stderr: String::new(),
                exit_code: 0,
            },
            Err((exit_code, stderr)) => CommandOutput {
                stdout: String::new(),
                stderr,
                exit_code,
            },
        }
    }

    fn lvcreate(&mut self, command: &CommandLine) -> Result<String, (i32, String)> {
        let name = command
            .option_value("--name")
            .ok_or((3, "missing --name".to_string()))?
            .to_string();
        let name_index = command
            .args
            .iter()
            .position(|arg| arg == "--name")
            .unwrap_or_default();
        let group_name = command
            .args
            .get(name_index + 2)
            .ok_or((3, "missing volume group".to_string()))?;
        let group = self
            .groups
            .get_mut(group_name)
            .ok_or_else(|| (5, format!("Volume group \"{group_name}\" not found")))?;

        if group.logical_volume(&name).is_some() {
            return Err((5, format!("Logical volume \"{name}\" already exists")));
        }

        let extents = if let Some(size) = command.option_value("-L") {
            let bytes = SizeSpec::parse(size)
                .ok()
                .and_then(|size| size.bytes())
                .ok_or_else(|| (3, format!("invalid size {size}")))?;
            bytes.div_ceil(group.extent_size)
        } else if let Some(size) = command.option_value("-l") {
            match SizeSpec::parse(size) {
                Ok(SizeSpec::Extents(extents)) => extents,
                Ok(SizeSpec::PoolRelative(raw)) => pool_extents(group, &raw),
                _ => return Err((3, format!("invalid extent count {size}"))),
            }
        } else {
            return Err((3, "missing size".to_string()));
        };

        if extents > group.free_extents {
            return Err((
                5,
                format!(
                    "Volume group \"{}\" has insufficient free space ({} extents): {} required.",
                    group.name, group.free_extents, extents
                ),
            ));
        }

        group.free_extents -= extents;
        group.logical_volumes.push(LogicalVolumeState {
            name: name.clone(),
            size: extents * group.extent_size,
            device_path: format!("/dev/{}/{}", group.name, name),
        });
        Ok(format!("  Logical volume \"{name}\" created.\n"))
    }

    fn lvextend(&mut self, command: &CommandLine) -> Result<String, (i32, String)> {
        let requested: u64 = command
            .option_value("-l")
            .and_then(|value| value.parse().ok())
            .ok_or((3, "lvextend needs an absolute -l".to_string()))?;
        let device_path = command
            .args
            .last()
            .ok_or((3, "missing logical volume path".to_string()))?;

        let group = self
            .groups
            .values_mut()
            .find(|group| {
                group
                    .logical_volumes
                    .iter()
                    .any(|lv| &lv.device_path == device_path)
            })
            .ok_or_else(|| (5, format!("Failed to find logical volume \"{device_path}\"")))?;

        let extent_size = group.extent_size;
        let free = group.free_extents;
        let volume = group
            .logical_volumes
            .iter_mut()
            .find(|lv| &lv.device_path == device_path)
            .ok_or_else(|| (5, format!("Failed to find logical volume \"{device_path}\"")))?;

        let current = volume.size / extent_size;
        if requested <= current {
            return Err((5, "New size given must be larger than current size".to_string()));
        }
        let delta = requested - current;
        if delta > free {
            return Err((5, format!("Insufficient free space: {delta} extents needed")));
        }

        volume.size = requested * extent_size;
        group.free_extents -= delta;
        Ok(format!("  Logical volume {device_path} successfully resized.\n"))
    }

    fn pvresize(&mut self, command: &CommandLine) -> Result<String, (i32, String)> {
        let device = command
            .args
            .first()
            .ok_or((3, "missing physical volume".to_string()))?;
        let growth = self.pv_growth.remove(device).unwrap_or_default();

        let group = self
            .groups
            .values_mut()
            .find(|group| group.physical_volumes.iter().any(|pv| &pv.device == device))
            .ok_or_else(|| (5, format!("Failed to find physical volume \"{device}\"")))?;

        group.extent_count += growth;
        group.free_extents += growth;
        debug!("pvresize {} grew group {} by {} extents", device, group.name, growth);
        Ok("  1 physical volume(s) resized or updated / 0 physical volume(s) not resized\n"
            .to_string())
    }

    fn mkfs(&mut self, command: &CommandLine) -> Result<String, (i32, String)> {
        let fs_type = command
            .option_value("-t")
            .ok_or((1, "missing filesystem type".to_string()))?
            .to_string();
        let device = command
            .args
            .last()
            .ok_or((1, "missing device".to_string()))?
            .clone();
        self.filesystems.insert(device, fs_type);
        Ok(String::new())
    }
}

fn pool_extents(group: &VolumeGroupState, raw: &str) -> u64 {
    let (percent, base) = raw.split_once('%').unwrap_or(("0", "FREE"));
    let percent: u64 = percent.parse().unwrap_or_default();
    let pool = match base {
        "FREE" => group.free_extents,
        _ => group.extent_count,
    };
    pool * percent / 100
}

impl VolumeQuery for FakeEngine {
    fn list_volume_groups(&self) -> Result<Vec<VolumeGroupState>, StorageError> {
        let mut state = self.lock();
        state.queries += 1;
        if let Some(message) = &state.query_failure {
            return Err(StorageError::infrastructure(message.clone()));
        }
        Ok(state.groups.values().cloned().collect())
    }
}

impl CommandRunner for FakeEngine {
    fn run(&self, command: &CommandLine) -> Result<CommandOutput, StorageError> {
        let mut state = self.lock();
        state.commands.push(command.clone());
        if let Some(output) = state.failing_programs.get(&command.program) {
            return Ok(output.clone());
        }
        Ok(state.apply(command))
    }
}

impl FilesystemProbe for FakeEngine {
    fn detect_filesystem_type(&self, device: &str) -> Result<Option<String>, StorageError> {
        Ok(self.filesystem(device))
    }
}

impl FilesystemOps for FakeEngine {
    fn is_mounted(&self, device: &str) -> Result<bool, StorageError> {
        Ok(self.lock().mounts.contains_key(device))
    }

    fn ensure_directory(&self, path: &str) -> Result<(), StorageError> {
        self.lock().directories.insert(path.to_string());
        Ok(())
    }

    fn mount(
        &self,
        device: &str,
        mount: &MountSpec,
        _fs_type: Option<&str>,
    ) -> Result<bool, StorageError> {
        let mut state = self.lock();
        if state.mounts.get(device) == Some(mount) {
            return Ok(false);
        }
        state.mounts.insert(device.to_string(), mount.clone());
        Ok(true)
    }
}
