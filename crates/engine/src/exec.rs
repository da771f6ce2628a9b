// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child-process execution for verb steps.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::warn;

/// Exit code synthesized when a child exceeds its wall-clock timeout.
pub const EXIT_CODE_TIMEOUT: i32 = 124;

/// Exit code synthesized when the child could not be spawned at all.
const EXIT_CODE_SPAWN_FAILED: i32 = 127;

/// Captured outcome of one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    /// Merged stdout+stderr.
    pub output: String,
}

/// Run `argv` with no stdin, capturing stdout and stderr into one string.
///
/// Total: every failure mode (spawn, wait, timeout, signal death) is folded
/// into an exit code plus a message, matching how verb failures are
/// reported. Timeout kills the child (`kill_on_drop`) and yields exit 124.
pub async fn run_command(argv: &[String], cwd: &Path, timeout_secs: u64) -> CommandOutput {
    let Some((program, args)) = argv.split_first() else {
        return CommandOutput {
            exit_code: EXIT_CODE_SPAWN_FAILED,
            output: "ERROR: empty command".to_string(),
        };
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(program = %program, error = %e, "failed to spawn verb command");
            return CommandOutput {
                exit_code: EXIT_CODE_SPAWN_FAILED,
                output: format!("ERROR: failed to spawn {program}: {e}"),
            };
        }
    };

    let wait = child.wait_with_output();
    match tokio::time::timeout(Duration::from_secs(timeout_secs), wait).await {
        Ok(Ok(output)) => {
            let mut merged = String::from_utf8_lossy(&output.stdout).into_owned();
            merged.push_str(&String::from_utf8_lossy(&output.stderr));
            CommandOutput {
                exit_code: output.status.code().unwrap_or(-1),
                output: merged,
            }
        }
        Ok(Err(e)) => CommandOutput {
            exit_code: EXIT_CODE_SPAWN_FAILED,
            output: format!("ERROR: failed to collect command output: {e}"),
        },
        Err(_) => {
            warn!(program = %program, timeout_secs, "verb command timed out");
            CommandOutput {
                exit_code: EXIT_CODE_TIMEOUT,
                output: format!("ERROR: Execution timed out after {timeout_secs} seconds"),
            }
        }
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
