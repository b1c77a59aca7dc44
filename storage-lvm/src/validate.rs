// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::StorageError;
use storage_types::{DesiredVolumeSpec, SizeSpec};

/// Check a spec before anything touches the engine and return its parsed
/// size. Every failure is a configuration error.
pub fn validate(spec: &DesiredVolumeSpec) -> Result<SizeSpec, StorageError> {
    check_name("group", &spec.group)?;
    check_name("name", &spec.name)?;

    let size = spec.size_spec().map_err(|error| {
        StorageError::configuration(format!("{}: {}", spec.display_name(), error))
    })?;

    let invalid =
        |reason: &str| StorageError::configuration(format!("{}: {}", spec.display_name(), reason));

    if spec.stripes == Some(0) {
        return Err(invalid("stripes must be at least 1"));
    }
    if spec.stripe_size.is_some() && spec.stripes.unwrap_or(1) < 2 {
        return Err(invalid("stripe_size requires stripes >= 2"));
    }
    if is_blank(spec.stripe_size.as_deref()) {
        return Err(invalid("stripe_size must not be empty"));
    }
    if is_blank(spec.readahead.as_deref()) {
        return Err(invalid("readahead must not be empty"));
    }
    if is_blank(spec.filesystem.as_deref()) {
        return Err(invalid("filesystem must not be empty"));
    }
    if spec.physical_volumes.iter().any(|pv| pv.trim().is_empty()) {
        return Err(invalid("physical_volumes must not contain empty entries"));
    }
    if let Some(mount_point) = &spec.mount_point {
        let mount = mount_point.spec();
        if !mount.location.starts_with('/') {
            return Err(invalid("mount_point location must be an absolute path"));
        }
    }

    Ok(size)
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_some_and(|value| value.trim().is_empty())
}

// LVM accepts [a-zA-Z0-9+_.-], not starting with '-', and not "." or "..".
fn check_name(field: &str, value: &str) -> Result<(), StorageError> {
    let valid = !value.is_empty()
        && !value.starts_with('-')
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '.' | '-'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::configuration(format!(
            "invalid {field} '{value}'"
        )))
    }
}
