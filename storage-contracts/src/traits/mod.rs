// SPDX-License-Identifier: GPL-3.0-only

pub mod command;
pub mod filesystem;
pub mod volume;

pub use command::CommandRunner;
pub use filesystem::{FilesystemOps, FilesystemProbe};
pub use volume::VolumeQuery;
