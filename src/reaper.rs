use nix::unistd::Pid;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::registry::{ChildProcess, Registry};
use crate::termination::TerminationReason;

/// Result of one non-blocking wait on a child
#[derive(Debug)]
enum WaitResult {
    Running,
    Terminated(i32),
    NoProcess,
    Failed(io::Error),
}

/// Polls every unfinished child until all of them have terminated.
pub struct Reaper {
    poll_interval: Duration,
}

impl Reaper {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Blocks until every record in the registry is finished.
    ///
    /// Runs a pass over all unfinished records, then sleeps for the poll
    /// interval and repeats while any child is still running.
    pub async fn wait_all(&self, registry: &mut Registry) {
        loop {
            let pending = self.poll_pass(registry);
            if pending == 0 {
                break;
            }
            debug!("{} workloads still running", pending);
            sleep(self.poll_interval).await;
        }
    }

    /// Tries a non-blocking wait on every unfinished record and classifies
    /// those that terminated.
    ///
    /// # Returns
    /// * `usize` - Number of records still running after this pass
    pub fn poll_pass(&self, registry: &mut Registry) -> usize {
        let mut pending = 0;
        for child in registry.unfinished_mut() {
            let pid = child.pid().map(Pid::as_raw).unwrap_or(0);
            match try_wait(child) {
                WaitResult::Running => pending += 1,
                WaitResult::Terminated(raw) => classify(child, pid, raw),
                WaitResult::NoProcess => {
                    // never launched, nothing will ever report on it
                    warn!("no process for {}", child.command_line().to_string_lossy());
                    child.finish(None, TerminationReason::Unrecognized);
                    info!("** {} finished **", pid);
                }
                WaitResult::Failed(e) => {
                    error!("** wait for {} failed: {} **", pid, e);
                    child.finish(None, TerminationReason::Unrecognized);
                    info!("** {} finished **", pid);
                }
            }
        }
        pending
    }
}

fn classify(child: &mut ChildProcess, pid: i32, raw: i32) {
    let reason = TerminationReason::decode(raw);
    child.finish(Some(raw), reason);
    info!("** {} finished **", pid);
    let command_line = child.command_line().to_string_lossy();
    match reason {
        TerminationReason::ExitedWith(0) => {}
        TerminationReason::ExitedWith(_) | TerminationReason::KilledBySignal(_) => {
            info!("** {} for {} **", reason, command_line);
        }
        TerminationReason::Unrecognized => {
            error!("** unhandled wait status {:#x} for {} **", raw, command_line);
        }
    }
}

fn try_wait(child: &mut ChildProcess) -> WaitResult {
    let Some(handle) = child.handle_mut() else {
        return WaitResult::NoProcess;
    };
    match handle.try_wait() {
        Ok(None) => WaitResult::Running,
        Ok(Some(status)) => WaitResult::Terminated(status.into_raw()),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => WaitResult::Running,
        Err(e) => WaitResult::Failed(e),
    }
}
