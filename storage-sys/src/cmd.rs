// SPDX-License-Identifier: GPL-3.0-only

use std::io::Write;
use std::process::{Command, Stdio};

use storage_contracts::{CommandLine, CommandOutput, CommandRunner, StorageError};
use tracing::debug;

/// Runs commands as child processes of this one.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandLine) -> Result<CommandOutput, StorageError> {
        let spawn_failed = |error: std::io::Error| {
            StorageError::infrastructure(format!("failed to run {}: {}", command.program, error))
        };

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_failed)?;

        if let (Some(input), Some(mut stdin)) = (&command.stdin, child.stdin.take()) {
            // A tool that exits without reading its prompt closes the pipe early.
            if let Err(error) = stdin.write_all(input.as_bytes()) {
                debug!("{} closed stdin early: {}", command.program, error);
            }
        }

        let output = child.wait_with_output().map_err(spawn_failed)?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            // Killed by a signal
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}
