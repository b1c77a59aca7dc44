// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem probing, directory creation and mounting
//!
//! Mounting is delegated to `mount(8)`; enabling at boot keeps exactly one
//! `/etc/fstab` line per device.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use storage_contracts::{
    CommandLine, CommandRunner, FilesystemOps, FilesystemProbe, StorageError,
};
use storage_types::MountSpec;
use tracing::{debug, info};

use crate::error::SysError;
use crate::mounts::read_mountinfo;

const DEFAULT_MOUNTINFO: &str = "/proc/self/mountinfo";
const DEFAULT_FSTAB: &str = "/etc/fstab";

/// Filesystem type detection through `blkid`
pub struct Blkid {
    runner: Arc<dyn CommandRunner>,
}

impl Blkid {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl FilesystemProbe for Blkid {
    fn detect_filesystem_type(&self, device: &str) -> Result<Option<String>, StorageError> {
        let command = CommandLine::new("blkid").args(["-o", "value", "-s", "TYPE", device]);
        let output = self.runner.run(&command)?;
        debug!(
            "blkid exit status {} for {}: {:?}",
            output.exit_code, device, output.stdout
        );

        let fs_type = output.stdout.trim();
        if output.success() && !fs_type.is_empty() {
            Ok(Some(fs_type.to_string()))
        } else {
            Ok(None)
        }
    }
}

/// Directory, mount and fstab primitives of the host
pub struct SystemFilesystems {
    runner: Arc<dyn CommandRunner>,
    mountinfo_path: PathBuf,
    fstab_path: PathBuf,
}

impl SystemFilesystems {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_paths(runner, DEFAULT_MOUNTINFO, DEFAULT_FSTAB)
    }

    pub fn with_paths(
        runner: Arc<dyn CommandRunner>,
        mountinfo_path: impl Into<PathBuf>,
        fstab_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            mountinfo_path: mountinfo_path.into(),
            fstab_path: fstab_path.into(),
        }
    }

    /// Tools the format and mount steps run
    pub fn required_tools(format: bool, mount: bool) -> Vec<&'static str> {
        let mut tools = Vec::new();
        if format {
            tools.extend(["blkid", "mkfs"]);
        }
        if mount {
            tools.push("mount");
        }
        tools
    }

    /// Fail before any volume is touched when a format or mount tool is missing
    pub fn require_tools(format: bool, mount: bool) -> Result<(), SysError> {
        for tool in Self::required_tools(format, mount) {
            which::which(tool).map_err(|_| SysError::ToolNotFound(tool.to_string()))?;
        }
        Ok(())
    }

    fn mounted_at(&self, device: &str, location: Option<&str>) -> Result<bool, SysError> {
        Ok(read_mountinfo(&self.mountinfo_path)?
            .iter()
            .any(|entry| {
                same_device(&entry.source, device)
                    && location.is_none_or(|location| entry.mount_point == location)
            }))
    }

    fn enable_at_boot(
        &self,
        device: &str,
        mount: &MountSpec,
        fs_type: Option<&str>,
    ) -> Result<bool, SysError> {
        let current = match fs::read_to_string(&self.fstab_path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(error) => return Err(SysError::io(&self.fstab_path, error)),
        };

        let line = fstab_line(device, mount, fs_type);
        let Some(updated) = update_fstab(&current, &line, device) else {
            return Ok(false);
        };

        fs::write(&self.fstab_path, updated)
            .map_err(|error| SysError::io(&self.fstab_path, error))?;
        info!(
            "Enabled {} on {} in {:?}",
            device,
            mount.trimmed_location(),
            self.fstab_path
        );
        Ok(true)
    }
}

impl FilesystemOps for SystemFilesystems {
    fn is_mounted(&self, device: &str) -> Result<bool, StorageError> {
        Ok(self.mounted_at(device, None)?)
    }

    fn ensure_directory(&self, path: &str) -> Result<(), StorageError> {
        fs::create_dir_all(path).map_err(|error| SysError::io(path, error))?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o777))
            .map_err(|error| SysError::io(path, error))?;
        Ok(())
    }

    fn mount(
        &self,
        device: &str,
        mount: &MountSpec,
        fs_type: Option<&str>,
    ) -> Result<bool, StorageError> {
        let mut changed = false;

        if !self.mounted_at(device, Some(mount.trimmed_location()))? {
            let command = mount_command(device, mount, fs_type);
            debug!("Running command: {}", command);
            let output = self.runner.run(&command)?;
            if !output.success() {
                return Err(StorageError::Execution {
                    command: command.to_string(),
                    exit_code: output.exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                });
            }
            changed = true;
        }

        changed |= self.enable_at_boot(device, mount, fs_type)?;
        Ok(changed)
    }
}

fn mount_command(device: &str, mount: &MountSpec, fs_type: Option<&str>) -> CommandLine {
    let mut command = CommandLine::new("mount");
    if let Some(fs_type) = fs_type {
        command = command.args(["-t", fs_type]);
    }
    if let Some(options) = &mount.options {
        command = command.args(["-o", options.as_str()]);
    }
    command.arg(device).arg(mount.trimmed_location())
}

fn fstab_line(device: &str, mount: &MountSpec, fs_type: Option<&str>) -> String {
    format!(
        "{} {} {} {} {} {}",
        device,
        mount.trimmed_location(),
        fs_type.unwrap_or("auto"),
        mount.options.as_deref().unwrap_or("defaults"),
        mount.dump.unwrap_or(0),
        mount.pass.unwrap_or(2)
    )
}

/// New fstab contents with `line` as the only entry for `device`, or `None`
/// when that entry is already present.
fn update_fstab(contents: &str, line: &str, device: &str) -> Option<String> {
    let desired: Vec<&str> = line.split_whitespace().collect();
    let mut present = false;
    let mut replaced = false;
    let mut lines = Vec::new();

    for existing in contents.lines() {
        let fields: Vec<&str> = existing.split_whitespace().collect();
        let is_entry = fields.first().is_some_and(|first| !first.starts_with('#'));
        if is_entry && fields[0] == device {
            if fields == desired && !present {
                present = true;
                lines.push(existing.to_string());
            } else {
                replaced = true;
            }
            continue;
        }
        lines.push(existing.to_string());
    }

    if present && !replaced {
        return None;
    }
    if !present {
        lines.push(line.to_string());
    }

    let mut updated = lines.join("\n");
    updated.push('\n');
    Some(updated)
}

fn same_device(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (
        fs::canonicalize(Path::new(a)),
        fs::canonicalize(Path::new(b)),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use storage_contracts::CommandOutput;

    use super::*;

    #[derive(Default)]
    struct RecordingRunner {
        commands: Mutex<Vec<String>>,
        output: CommandOutput,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, command: &CommandLine) -> Result<CommandOutput, StorageError> {
            self.commands.lock().unwrap().push(command.to_string());
            Ok(self.output.clone())
        }
    }

    fn mount_spec(location: &str) -> MountSpec {
        MountSpec {
            location: location.to_string(),
            options: Some("noatime".to_string()),
            dump: None,
            pass: None,
        }
    }

    #[test]
    fn blkid_reports_type_only_on_success() {
        let runner = Arc::new(RecordingRunner {
            output: CommandOutput {
                stdout: "ext4\n".to_string(),
                ..CommandOutput::default()
            },
            ..RecordingRunner::default()
        });
        let probe = Blkid::new(runner.clone());
        assert_eq!(
            probe.detect_filesystem_type("/dev/mapper/vg0-data").unwrap(),
            Some("ext4".to_string())
        );
        assert_eq!(
            runner.commands.lock().unwrap()[0],
            "blkid -o value -s TYPE /dev/mapper/vg0-data"
        );

        let unformatted = Blkid::new(Arc::new(RecordingRunner {
            output: CommandOutput {
                exit_code: 2,
                ..CommandOutput::default()
            },
            ..RecordingRunner::default()
        }));
        assert_eq!(unformatted.detect_filesystem_type("/dev/sdz").unwrap(), None);
    }

    #[test]
    fn builds_mount_command_and_fstab_line() {
        let mount = mount_spec("/srv/data");
        assert_eq!(
            mount_command("/dev/mapper/vg0-data", &mount, Some("xfs")).to_string(),
            "mount -t xfs -o noatime /dev/mapper/vg0-data /srv/data"
        );
        assert_eq!(
            fstab_line("/dev/mapper/vg0-data", &mount, None),
            "/dev/mapper/vg0-data /srv/data auto noatime 0 2"
        );
    }

    #[test]
    fn fstab_update_is_idempotent() {
        let line = "/dev/mapper/vg0-data /srv/data ext4 defaults 0 2";
        let original = "# static file system information\nUUID=abc / ext4 defaults 0 1\n";

        let updated = update_fstab(original, line, "/dev/mapper/vg0-data").unwrap();
        assert!(updated.ends_with(&format!("{line}\n")));
        assert!(updated.starts_with("# static"));
        assert_eq!(update_fstab(&updated, line, "/dev/mapper/vg0-data"), None);
    }

    #[test]
    fn fstab_update_replaces_stale_entry() {
        let stale = "/dev/mapper/vg0-data /old ext4 defaults 0 2\n";
        let line = "/dev/mapper/vg0-data /srv/data ext4 defaults 0 2";
        assert_eq!(
            update_fstab(stale, line, "/dev/mapper/vg0-data").unwrap(),
            format!("{line}\n")
        );
    }

    #[test]
    fn mounts_and_enables_once() {
        let dir = tempfile::tempdir().unwrap();
        let mountinfo = dir.path().join("mountinfo");
        let fstab = dir.path().join("fstab");
        fs::write(&mountinfo, "36 25 8:2 / / rw - ext4 /dev/sda2 rw\n").unwrap();

        let runner = Arc::new(RecordingRunner::default());
        let filesystems = SystemFilesystems::with_paths(runner.clone(), &mountinfo, &fstab);
        let mount = mount_spec("/srv/data");

        assert!(!filesystems.is_mounted("/dev/mapper/vg0-data").unwrap());
        assert!(filesystems.mount("/dev/mapper/vg0-data", &mount, Some("ext4")).unwrap());
        assert_eq!(runner.commands.lock().unwrap().len(), 1);
        assert!(fs::read_to_string(&fstab).unwrap().contains("/srv/data ext4 noatime 0 2"));

        fs::write(
            &mountinfo,
            "36 25 8:2 / / rw - ext4 /dev/sda2 rw\n90 36 253:3 / /srv/data rw - ext4 /dev/mapper/vg0-data rw\n",
        )
        .unwrap();
        assert!(filesystems.is_mounted("/dev/mapper/vg0-data").unwrap());
        assert!(!filesystems.mount("/dev/mapper/vg0-data", &mount, Some("ext4")).unwrap());
        assert_eq!(runner.commands.lock().unwrap().len(), 1);
    }

    #[test]
    fn trailing_slash_location_matches_existing_mount() {
        let dir = tempfile::tempdir().unwrap();
        let mountinfo = dir.path().join("mountinfo");
        let fstab = dir.path().join("fstab");
        fs::write(
            &mountinfo,
            "90 36 253:3 / /srv/data rw - ext4 /dev/mapper/vg0-data rw\n",
        )
        .unwrap();
        fs::write(&fstab, "/dev/mapper/vg0-data /srv/data ext4 noatime 0 2\n").unwrap();

        let runner = Arc::new(RecordingRunner::default());
        let filesystems = SystemFilesystems::with_paths(runner.clone(), &mountinfo, &fstab);

        let changed = filesystems
            .mount("/dev/mapper/vg0-data", &mount_spec("/srv/data/"), Some("ext4"))
            .unwrap();

        assert!(!changed);
        assert!(runner.commands.lock().unwrap().is_empty());
        assert_eq!(
            fs::read_to_string(&fstab).unwrap(),
            "/dev/mapper/vg0-data /srv/data ext4 noatime 0 2\n"
        );
    }

    #[test]
    fn non_ascii_location_matches_existing_mount() {
        let dir = tempfile::tempdir().unwrap();
        let mountinfo = dir.path().join("mountinfo");
        fs::write(
            &mountinfo,
            "90 36 253:3 / /srv/donn\u{e9}es rw - xfs /dev/mapper/vg0-data rw\n",
        )
        .unwrap();

        let runner = Arc::new(RecordingRunner::default());
        let filesystems =
            SystemFilesystems::with_paths(runner.clone(), &mountinfo, dir.path().join("fstab"));

        filesystems
            .mount("/dev/mapper/vg0-data", &mount_spec("/srv/donn\u{e9}es"), Some("xfs"))
            .unwrap();

        assert!(runner.commands.lock().unwrap().is_empty());
    }

    #[test]
    fn requires_only_the_tools_a_volume_needs() {
        assert!(SystemFilesystems::required_tools(false, false).is_empty());
        assert_eq!(SystemFilesystems::required_tools(true, false), ["blkid", "mkfs"]);
        assert_eq!(
            SystemFilesystems::required_tools(true, true),
            ["blkid", "mkfs", "mount"]
        );
        assert!(SystemFilesystems::require_tools(false, false).is_ok());
    }

    #[test]
    fn failed_mount_is_an_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let mountinfo = dir.path().join("mountinfo");
        fs::write(&mountinfo, "").unwrap();
        let runner = Arc::new(RecordingRunner {
            output: CommandOutput {
                stderr: "mount: wrong fs type".to_string(),
                exit_code: 32,
                ..CommandOutput::default()
            },
            ..RecordingRunner::default()
        });
        let filesystems =
            SystemFilesystems::with_paths(runner, &mountinfo, dir.path().join("fstab"));

        let error = filesystems
            .mount("/dev/mapper/vg0-data", &mount_spec("/srv/data"), None)
            .unwrap_err();
        assert!(matches!(error, StorageError::Execution { exit_code: 32, .. }));
    }

    #[test]
    fn creates_world_writable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c");
        let filesystems = SystemFilesystems::new(Arc::new(RecordingRunner::default()));

        filesystems.ensure_directory(target.to_str().unwrap()).unwrap();

        let mode = fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
    }
}
