// SPDX-License-Identifier: GPL-3.0-only

//! Create / extend / no-op decision for one logical volume.

use std::fmt;

use serde::Serialize;
use storage_contracts::StorageError;
use storage_types::{DesiredVolumeSpec, SizeSpec, VolumeGroupState};
use tracing::debug;

use crate::extents::{SizeTarget, current_extents, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    /// The volume exists and the spec does not allow resizing
    ResizeDisabled,
    /// The volume is already at or above the requested size
    AtOrAboveTarget,
}

/// What a reconciliation pass has to do. Fatal outcomes are the `Err` side
/// of [`decide`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum Action {
    Create,
    Extend {
        device_path: String,
        current_extents: u64,
        requested_extents: u64,
    },
    NoOp {
        reason: NoOpReason,
    },
}

impl Action {
    /// Extents an extend adds to the volume
    pub fn delta(&self) -> Option<u64> {
        match self {
            Self::Extend {
                current_extents,
                requested_extents,
                ..
            } => Some(requested_extents - current_extents),
            Self::Create | Self::NoOp { .. } => None,
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::NoOp { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Extend {
                current_extents,
                requested_extents,
                ..
            } => write!(
                f,
                "extend from {} to {} extents",
                current_extents, requested_extents
            ),
            Self::NoOp {
                reason: NoOpReason::ResizeDisabled,
            } => write!(f, "no change (resize disabled)"),
            Self::NoOp {
                reason: NoOpReason::AtOrAboveTarget,
            } => write!(f, "no change (already at or above target)"),
        }
    }
}

/// Decide the action for `spec` against a snapshot of its group.
///
/// `group` is `None` when the engine reports no such group.
pub fn decide(
    spec: &DesiredVolumeSpec,
    size: &SizeSpec,
    group: Option<&VolumeGroupState>,
) -> Result<Action, StorageError> {
    let group = group.ok_or_else(|| StorageError::GroupNotFound {
        group: spec.group.clone(),
    })?;

    let Some(volume) = group.logical_volume(&spec.name) else {
        debug!(
            "Logical volume {} not found, it will be created",
            spec.display_name()
        );
        return Ok(Action::Create);
    };

    if !spec.resize {
        debug!(
            "Logical volume {} exists and resize is disabled",
            spec.display_name()
        );
        return Ok(Action::NoOp {
            reason: NoOpReason::ResizeDisabled,
        });
    }

    let current = current_extents(volume, group)?;
    let requested = match resolve(size, group.extent_size)? {
        SizeTarget::AbsoluteExtents(extents) => extents,
        SizeTarget::PoolRelative(token) => {
            return Err(StorageError::UnsupportedExtendSize {
                volume: spec.display_name(),
                token,
            });
        }
    };

    debug!(
        "Resizing logical volume {} from {} pe to {} pe with {} pe left in volume group {}",
        spec.display_name(),
        current,
        requested,
        group.free_extents,
        group.name
    );

    let needed = requested.saturating_sub(current);
    if needed > group.free_extents {
        return Err(StorageError::Capacity {
            group: group.name.clone(),
            volume: spec.display_name(),
            needed,
            free: group.free_extents,
        });
    }

    if current >= requested {
        debug!(
            "Logical volume {} already at requested size",
            spec.display_name()
        );
        return Ok(Action::NoOp {
            reason: NoOpReason::AtOrAboveTarget,
        });
    }

    Ok(Action::Extend {
        device_path: volume.device_path.clone(),
        current_extents: current,
        requested_extents: requested,
    })
}

#[cfg(test)]
mod tests {
    use storage_types::{LogicalVolumeState, PhysicalVolumeRef};

    use super::*;

    const FOUR_MIB: u64 = 4 * 1024 * 1024;

    fn group_with_data(current_extents: u64, free_extents: u64) -> VolumeGroupState {
        VolumeGroupState {
            name: "vg0".to_string(),
            extent_size: FOUR_MIB,
            extent_count: current_extents + free_extents,
            free_extents,
            physical_volumes: vec![PhysicalVolumeRef {
                device: "/dev/sdb".to_string(),
                size: (current_extents + free_extents) * FOUR_MIB,
                free: free_extents * FOUR_MIB,
            }],
            logical_volumes: vec![LogicalVolumeState {
                name: "data".to_string(),
                size: current_extents * FOUR_MIB,
                device_path: "/dev/vg0/data".to_string(),
            }],
        }
    }

    fn resizable(size: &str) -> (DesiredVolumeSpec, SizeSpec) {
        let mut spec = DesiredVolumeSpec::new("vg0", "data", size);
        spec.resize = true;
        let size = spec.size_spec().unwrap();
        (spec, size)
    }

    #[test]
    fn missing_group_is_fatal() {
        let (spec, size) = resizable("10G");
        let error = decide(&spec, &size, None).unwrap_err();
        assert_eq!(
            error,
            StorageError::GroupNotFound {
                group: "vg0".to_string()
            }
        );
    }

    #[test]
    fn absent_volume_is_created_for_any_size_form() {
        let mut group = group_with_data(100, 50);
        group.logical_volumes.clear();
        for token in ["10G", "100", "50%FREE"] {
            let (spec, size) = resizable(token);
            assert_eq!(decide(&spec, &size, Some(&group)).unwrap(), Action::Create);
        }
    }

    #[test]
    fn extends_by_the_missing_extents() {
        let (spec, size) = resizable("500M");
        let action = decide(&spec, &size, Some(&group_with_data(100, 50))).unwrap();
        assert_eq!(
            action,
            Action::Extend {
                device_path: "/dev/vg0/data".to_string(),
                current_extents: 100,
                requested_extents: 119,
            }
        );
        assert_eq!(action.delta(), Some(19));
    }

    #[test]
    fn refuses_extend_beyond_free_extents() {
        let (spec, size) = resizable("500M");
        let error = decide(&spec, &size, Some(&group_with_data(100, 10))).unwrap_err();
        assert_eq!(
            error,
            StorageError::Capacity {
                group: "vg0".to_string(),
                volume: "vg0/data".to_string(),
                needed: 19,
                free: 10,
            }
        );
    }

    #[test]
    fn delta_equal_to_free_extents_fits() {
        let (spec, size) = resizable("119");
        let action = decide(&spec, &size, Some(&group_with_data(100, 19))).unwrap();
        assert_eq!(action.delta(), Some(19));
    }

    #[test]
    fn never_shrinks() {
        for token in ["100", "50", "1", "400M"] {
            let (spec, size) = resizable(token);
            assert_eq!(
                decide(&spec, &size, Some(&group_with_data(100, 0))).unwrap(),
                Action::NoOp {
                    reason: NoOpReason::AtOrAboveTarget
                },
                "{token}"
            );
        }
    }

    #[test]
    fn resize_disabled_ignores_size_delta() {
        let mut spec = DesiredVolumeSpec::new("vg0", "data", "10T");
        spec.resize = false;
        let size = spec.size_spec().unwrap();
        assert_eq!(
            decide(&spec, &size, Some(&group_with_data(1, 0))).unwrap(),
            Action::NoOp {
                reason: NoOpReason::ResizeDisabled
            }
        );
    }

    #[test]
    fn pool_relative_extend_is_rejected() {
        let (spec, size) = resizable("100%FREE");
        let error = decide(&spec, &size, Some(&group_with_data(100, 50))).unwrap_err();
        assert!(error.to_string().contains("unsupported size form for extend"));
    }

    #[test]
    fn capacity_invariant_holds_over_a_grid() {
        for current in [0_u64, 1, 10, 100] {
            for requested in [0_u64, 1, 11, 150, 300] {
                for free in [0_u64, 5, 50, 200] {
                    let (spec, size) = resizable(&requested.to_string());
                    let result = decide(&spec, &size, Some(&group_with_data(current, free)));
                    if requested > current && requested - current > free {
                        assert!(matches!(result, Err(StorageError::Capacity { .. })));
                    } else if requested <= current {
                        assert_eq!(
                            result.unwrap(),
                            Action::NoOp {
                                reason: NoOpReason::AtOrAboveTarget
                            }
                        );
                    } else {
                        assert_eq!(result.unwrap().delta(), Some(requested - current));
                    }
                }
            }
        }
    }

    #[test]
    fn renders_actions_for_humans() {
        let extend = Action::Extend {
            device_path: "/dev/vg0/data".to_string(),
            current_extents: 25,
            requested_extents: 125,
        };
        assert_eq!(extend.to_string(), "extend from 25 to 125 extents");
        assert_eq!(Action::Create.to_string(), "create");
        assert_eq!(
            Action::NoOp {
                reason: NoOpReason::ResizeDisabled
            }
            .to_string(),
            "no change (resize disabled)"
        );
    }
}
