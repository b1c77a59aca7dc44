// SPDX-License-Identifier: GPL-3.0-only

use crate::{CommandLine, CommandOutput, StorageError};

/// Executes storage engine commands.
///
/// A command that could not be started is an `Err`; a command that ran and
/// exited non-zero is an `Ok` output with a non-zero `exit_code`, left for
/// the caller to judge.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &CommandLine) -> Result<CommandOutput, StorageError>;
}
