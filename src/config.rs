use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::Result;

/// Supervisor settings.
///
/// The command line belongs to the directive stream, which uses `--` as data,
/// so settings are read from the environment (with defaults) instead of flags.
#[derive(Parser, Debug, Clone)]
#[command(name = "e2e-fio")]
#[command(no_binary_name = true)]
pub struct Settings {
    /// Executable prefixed to `--` launch groups
    #[arg(long, env = "E2E_FIO_EXECUTABLE", default_value = "fio")]
    pub executable: OsString,

    /// Shell used to run workloads and `command` directives
    #[arg(long, env = "E2E_FIO_SHELL", default_value = "/bin/sh")]
    pub shell: PathBuf,

    /// Directory under which each child gets a working directory named after its pid
    #[arg(long, env = "E2E_FIO_WORKSPACE_ROOT", default_value = ".")]
    pub workspace_root: PathBuf,

    /// Reaper poll interval (ms)
    #[arg(long, env = "E2E_FIO_POLL_INTERVAL_MS", default_value = "2000")]
    pub poll_interval_ms: u64,

    /// Pause between killing children and crashing the supervisor (ms)
    #[arg(long, env = "E2E_FIO_KILL_GRACE_MS", default_value = "1000")]
    pub kill_grace_ms: u64,
}

impl Settings {
    /// Reads settings from the environment, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Ok(Self::try_parse_from(std::iter::empty::<String>())?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executable: OsString::from("fio"),
            shell: PathBuf::from("/bin/sh"),
            workspace_root: PathBuf::from("."),
            poll_interval_ms: 2000,
            kill_grace_ms: 1000,
        }
    }
}
