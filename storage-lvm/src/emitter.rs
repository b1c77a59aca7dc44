// SPDX-License-Identifier: GPL-3.0-only

//! Command lines for the mutating steps of a pass.
//!
//! Nothing here runs a command; callers hand the result to a
//! [`CommandRunner`](storage_contracts::CommandRunner).

use storage_contracts::CommandLine;
use storage_types::{DesiredVolumeSpec, SizeSpec};

/// `lvcreate` for a volume that does not exist yet
pub fn create_command(spec: &DesiredVolumeSpec, size: &SizeSpec) -> CommandLine {
    let (size_flag, size_value) = size.create_argument();
    let mut command = CommandLine::new("lvcreate").arg(size_flag).arg(size_value);
    command = layout_flags(command, spec);

    if spec.contiguous {
        command = command.args(["--contiguous", "y"]);
    }
    if let Some(readahead) = &spec.readahead {
        command = command.arg("--readahead").arg(readahead);
    }

    command
        .arg("--name")
        .arg(&spec.name)
        .arg(&spec.group)
        .args(spec.physical_volumes.iter().cloned())
}

/// `lvextend` growing the volume at `device_path` to `requested_extents`,
/// resizing its filesystem along with it
pub fn extend_command(
    spec: &DesiredVolumeSpec,
    device_path: &str,
    requested_extents: u64,
) -> CommandLine {
    let command = CommandLine::new("lvextend")
        .arg("-l")
        .arg(requested_extents.to_string())
        .arg("--resizefs");
    layout_flags(command, spec).arg(device_path)
}

pub fn pvresize_command(device: &str) -> CommandLine {
    CommandLine::new("pvresize").arg(device)
}

/// `mkfs`, answering yes to any overwrite prompt
pub fn format_command(device: &str, fs_type: &str) -> CommandLine {
    CommandLine::new("mkfs")
        .args(["-t", fs_type, device])
        .stdin("y\n")
}

fn layout_flags(mut command: CommandLine, spec: &DesiredVolumeSpec) -> CommandLine {
    if let Some(stripes) = spec.stripes {
        command = command.arg("--stripes").arg(stripes.to_string());
    }
    if let Some(stripe_size) = &spec.stripe_size {
        command = command.arg("--stripesize").arg(stripe_size);
    }
    if let Some(mirrors) = spec.mirrors {
        command = command.arg("--mirrors").arg(mirrors.to_string());
    }
    command
}
