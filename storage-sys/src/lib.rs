// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for LVM reconciliation
//!
//! This crate provides the concrete collaborators behind the
//! `storage-contracts` traits:
//! - Process execution (`SystemRunner`)
//! - LVM inventory queries through `vgs`, `lvs` and `pvs` (`LvmTools`)
//! - Filesystem detection through `blkid` (`Blkid`)
//! - Directory creation, mounting and fstab entries (`SystemFilesystems`)
//!
//! These operations require elevated privileges.

pub mod cmd;
pub mod error;
pub mod filesystem;
pub mod logical;
pub mod mounts;

pub use cmd::SystemRunner;
pub use error::{Result, SysError};
pub use filesystem::{Blkid, SystemFilesystems};
pub use logical::lvm_tools::LvmTools;
