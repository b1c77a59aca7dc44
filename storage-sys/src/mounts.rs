// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::Path;

use crate::error::SysError;

/// One line of `/proc/self/mountinfo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub mount_point: String,
    pub fs_type: String,
    pub source: String,
}

pub fn read_mountinfo(path: &Path) -> Result<Vec<MountEntry>, SysError> {
    let mount_info = fs::read_to_string(path).map_err(|error| SysError::io(path, error))?;
    parse_mountinfo(&mount_info)
}

pub fn parse_mountinfo(input: &str) -> Result<Vec<MountEntry>, SysError> {
    input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let (left, right) = line
                .split_once(" - ")
                .ok_or_else(|| SysError::InvalidMountInfoLine(line.to_string()))?;

            let mount_point = left
                .split_whitespace()
                .nth(4)
                .ok_or_else(|| SysError::InvalidMountInfoLine(line.to_string()))?;

            let mut right_fields = right.split_whitespace();
            let fs_type = right_fields
                .next()
                .ok_or_else(|| SysError::InvalidMountInfoLine(line.to_string()))?;
            let source = right_fields
                .next()
                .ok_or_else(|| SysError::InvalidMountInfoLine(line.to_string()))?;

            Ok(MountEntry {
                mount_point: unescape_mount_field(mount_point),
                fs_type: fs_type.to_string(),
                source: unescape_mount_field(source),
            })
        })
        .collect()
}

fn unescape_mount_field(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1..index + 4].iter().all(u8::is_ascii_digit)
        {
            let octal = &value[index + 1..index + 4];
            if let Ok(num) = u8::from_str_radix(octal, 8) {
                output.push(num);
                index += 4;
                continue;
            }
        }

        output.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&output).into_owned()
}
