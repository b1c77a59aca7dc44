// SPDX-License-Identifier: GPL-3.0-only

pub mod protocol;
pub mod traits;

pub use protocol::{CommandLine, CommandOutput, StorageError, StorageErrorKind};
pub use traits::{CommandRunner, FilesystemOps, FilesystemProbe, VolumeQuery};
