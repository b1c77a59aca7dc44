// SPDX-License-Identifier: GPL-3.0-only

pub mod command;
pub mod errors;

pub use command::{CommandLine, CommandOutput};
pub use errors::{StorageError, StorageErrorKind};
