// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for LVM volume reconciliation
//!
//! This crate defines the types shared by every layer of the stack:
//!
//! - **storage-sys**: Builds `VolumeGroupState` snapshots from the LVM tools
//! - **storage-lvm**: Decides and emits commands from a `DesiredVolumeSpec`
//! - **storage-app**: Loads `DesiredVolumeSpec`s from configuration
//!
//! ## State vs. intent
//!
//! - `VolumeGroupState`, `LogicalVolumeState`, `PhysicalVolumeRef` → live
//!   engine state, re-read on every pass and never persisted here
//! - `DesiredVolumeSpec` → the declared target for one logical volume
//! - `SizeSpec` → the parsed form of the user's size token

pub mod lvm;
pub mod size;
pub mod volume_spec;

pub use lvm::{LogicalVolumeState, PhysicalVolumeRef, VolumeGroupState, to_dm_name};
pub use size::{SizeParseError, SizeSpec, SizeUnit};
pub use volume_spec::{DesiredVolumeSpec, MountPoint, MountSpec, PhysicalVolumeHints};
