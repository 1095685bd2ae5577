//! Bounded execution of external system commands.

use std::time::Duration;

use tokio::process::Command;

use crate::error::{Result, ScanError};

/// Run `program args..`, wait at most `timeout`, and return stdout on a zero exit.
///
/// The child is killed if the timeout elapses.
pub async fn run_command(program: &str, args: &[&str], timeout: Duration) -> Result<Vec<u8>> {
    let child = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(res) => res.map_err(|source| ScanError::CommandSpawn {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(ScanError::Timeout {
                what: format!("{program} {}", args.join(" ")),
                after: timeout,
            })
        }
    };

    if !output.status.success() {
        return Err(ScanError::CommandFailed {
            program: program.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output.stdout)
}
