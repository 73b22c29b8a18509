use eyre::{eyre, WrapErr};
use std::ffi::OsStr;
use std::path::Path;
use tokio::process::Command;
use tracing::info;

use crate::Result;

/// Runs `command_line` through `shell -c` and waits for it.
///
/// # Arguments
/// * `shell` - Shell used to interpret the command line
/// * `command_line` - The command to run
///
/// # Returns
/// * `Result<()>` - Ok if the command exited with status 0
pub async fn run_blocking(shell: &Path, command_line: &OsStr) -> Result<()> {
    let cmd_display = command_line.to_string_lossy();
    info!("running command: {}", cmd_display);
    let status = Command::new(shell)
        .arg("-c")
        .arg(command_line)
        .status()
        .await
        .wrap_err_with(|| format!("could not run `{}`", cmd_display))?;

    if status.success() {
        Ok(())
    } else {
        Err(eyre!("command `{}` failed: {}", cmd_display, status))
    }
}
