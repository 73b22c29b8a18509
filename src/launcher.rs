use eyre::WrapErr;
use nix::errno::Errno;
use nix::sys::stat::Mode;
use nix::unistd::{chdir, getpid, mkdir, Pid};
use std::ffi::{CStr, CString};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

use crate::registry::ChildProcess;
use crate::Result;

/// Room for the decimal digits of any pid
const PID_DIR_LEN: usize = 16;

/// Why a workload could not be started.
///
/// `Exec` and `InvalidCommand` are seen by the supervisor directly. `Workspace`
/// happens inside the new process, which reports it on stderr and exits with
/// the errno as its status.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LaunchError {
    #[error("could not prepare working directory: {0}")]
    Workspace(Errno),
    #[error("could not exec shell: {0}")]
    Exec(Errno),
    #[error("command line contains a NUL byte")]
    InvalidCommand,
}

impl LaunchError {
    /// Exit value used when this error ends a workload
    pub fn exit_code(&self) -> i32 {
        match *self {
            LaunchError::Workspace(errno) | LaunchError::Exec(errno) => errno as i32,
            LaunchError::InvalidCommand => libc::EINVAL,
        }
    }
}

/// Result of asking the launcher to start one workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The workload is running under this pid
    Started(Pid),
    /// No process was started
    Failed(LaunchError),
}

/// Starts workloads as separate processes.
///
/// Each workload runs as `<shell> -c <command line>` inside a working
/// directory named after its own pid, created under the workspace root, so
/// concurrent workloads do not trip over each other's files.
#[derive(Debug)]
pub struct Launcher {
    shell: PathBuf,
    workspace_root: CString,
}

impl Launcher {
    /// Creates a launcher
    ///
    /// # Arguments
    /// * `shell` - Shell used to interpret command lines
    /// * `workspace_root` - Parent directory of the per-workload directories
    ///
    /// # Returns
    /// * `Result<Self>` - The launcher, or an error if the root contains a NUL byte
    pub fn new(shell: &Path, workspace_root: &Path) -> Result<Self> {
        let workspace_root = CString::new(workspace_root.as_os_str().as_bytes())
            .wrap_err("invalid workspace root")?;
        Ok(Self {
            shell: shell.to_path_buf(),
            workspace_root,
        })
    }

    /// Spawns a new process for `record` and returns without waiting for it.
    ///
    /// On success the process handle is stored on the record and a launch
    /// acknowledgement is logged. Must be called from within the runtime.
    pub fn launch(&self, record: &mut ChildProcess) -> LaunchOutcome {
        if record.command_line().as_bytes().contains(&0) {
            return LaunchOutcome::Failed(LaunchError::InvalidCommand);
        }

        let mut command = Command::new(&self.shell);
        command.arg("-c").arg(record.command_line());

        let root = self.workspace_root.clone();
        // SAFETY: the closure runs between fork and exec; it only makes
        // system calls and formats into a stack buffer.
        unsafe {
            command.pre_exec(move || {
                prepare_child(&root);
                Ok(())
            });
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let errno = Errno::from_raw(e.raw_os_error().unwrap_or(libc::EIO));
                return LaunchOutcome::Failed(LaunchError::Exec(errno));
            }
        };

        match record.attach(child) {
            Some(pid) => {
                info!("pid:{}, {}", pid, record.command_line().to_string_lossy());
                LaunchOutcome::Started(pid)
            }
            None => LaunchOutcome::Failed(LaunchError::Exec(Errno::ESRCH)),
        }
    }
}

/// Child side of a launch. Does not return if the working directory cannot be
/// entered.
fn prepare_child(root: &CStr) {
    if let Err(error) = enter_workspace(root) {
        let _ = nix::unistd::write(
            std::io::stderr(),
            b"** could not create or enter working directory **\n",
        );
        // SAFETY: _exit skips atexit handlers and stdio flushing, both of
        // which belong to the parent.
        unsafe { libc::_exit(error.exit_code()) }
    }
}

/// Moves the calling process into `<root>/<own pid>`, creating it if needed
fn enter_workspace(root: &CStr) -> std::result::Result<(), LaunchError> {
    chdir(root).map_err(LaunchError::Workspace)?;

    let mut buf = [0u8; PID_DIR_LEN];
    let dir = pid_dir_name(getpid(), &mut buf)?;
    match mkdir(dir, Mode::from_bits_truncate(0o777)) {
        Ok(()) | Err(Errno::EEXIST) => {}
        Err(errno) => return Err(LaunchError::Workspace(errno)),
    }
    chdir(dir).map_err(LaunchError::Workspace)
}

/// Formats a pid into `buf` without allocating
fn pid_dir_name(pid: Pid, buf: &mut [u8; PID_DIR_LEN]) -> std::result::Result<&[u8], LaunchError> {
    let mut rest = &mut buf[..];
    write!(rest, "{}", pid).map_err(|_| LaunchError::Workspace(Errno::ENAMETOOLONG))?;
    let len = PID_DIR_LEN - rest.len();
    Ok(&buf[..len])
}
