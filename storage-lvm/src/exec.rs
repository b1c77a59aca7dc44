// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{CommandLine, CommandOutput, CommandRunner, StorageError};
use tracing::{debug, error};

/// Run a mutating command; a non-zero exit is an execution error.
pub(crate) fn execute(
    runner: &dyn CommandRunner,
    command: &CommandLine,
) -> Result<CommandOutput, StorageError> {
    debug!("Running command: {}", command);
    let output = runner.run(command)?;
    debug!("Command output: {}", output.stdout.trim_end());

    if !output.success() {
        error!(
            "{} failed with status {}: {}",
            command.program,
            output.exit_code,
            output.stderr.trim_end()
        );
        return Err(StorageError::Execution {
            command: command.to_string(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }

    Ok(output)
}
