use nix::unistd::Pid;
use std::ffi::{OsStr, OsString};
use tokio::process::Child;
use tracing::info;

use crate::termination::TerminationReason;

/// One launched workload.
///
/// The command line is fixed at creation. The process handle is attached once
/// by the launcher, and the termination is recorded once by the reaper; after
/// that the record is finished and never changes again.
#[derive(Debug)]
pub struct ChildProcess {
    command_line: OsString,
    pid: Option<Pid>,
    handle: Option<Child>,
    raw_status: Option<i32>,
    termination: Option<TerminationReason>,
}

impl ChildProcess {
    pub fn new(command_line: impl Into<OsString>) -> Self {
        Self {
            command_line: command_line.into(),
            pid: None,
            handle: None,
            raw_status: None,
            termination: None,
        }
    }

    pub fn command_line(&self) -> &OsStr {
        &self.command_line
    }

    /// OS process id, `None` until the launcher has started the child
    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// Raw wait status, if one was observed
    pub fn raw_status(&self) -> Option<i32> {
        self.raw_status
    }

    pub fn termination(&self) -> Option<TerminationReason> {
        self.termination
    }

    pub fn is_finished(&self) -> bool {
        self.termination.is_some()
    }

    /// Normal exit code, 0 if the child did not exit normally
    pub fn exit_code(&self) -> i32 {
        match self.termination {
            Some(TerminationReason::ExitedWith(code)) => code,
            _ => 0,
        }
    }

    /// Terminating signal number, 0 if the child was not signaled
    pub fn terminating_signal(&self) -> i32 {
        match self.termination {
            Some(TerminationReason::KilledBySignal(sig)) => sig,
            _ => 0,
        }
    }

    pub fn is_abnormal(&self) -> bool {
        matches!(self.termination, Some(TerminationReason::Unrecognized))
    }

    /// Keeps the handle of the freshly spawned child and records its pid.
    ///
    /// Returns `None` and leaves the record untouched if a child was already
    /// attached or the handle has no pid.
    pub(crate) fn attach(&mut self, handle: Child) -> Option<Pid> {
        if self.pid.is_some() {
            return None;
        }
        let pid = Pid::from_raw(i32::try_from(handle.id()?).ok()?);
        self.pid = Some(pid);
        self.handle = Some(handle);
        Some(pid)
    }

    pub(crate) fn handle_mut(&mut self) -> Option<&mut Child> {
        self.handle.as_mut()
    }

    /// Records how the child terminated.
    ///
    /// Returns false and leaves the record untouched if it was already finished.
    pub(crate) fn finish(&mut self, raw_status: Option<i32>, reason: TerminationReason) -> bool {
        if self.termination.is_some() {
            return false;
        }
        self.raw_status = raw_status;
        self.termination = Some(reason);
        true
    }
}

/// Ordered, append-only collection of launched workloads.
///
/// Insertion order is directive order. Records are never removed.
#[derive(Debug, Default)]
pub struct Registry {
    children: Vec<ChildProcess>,
}

impl Registry {
    pub fn new() -> Self {
        Self { children: Vec::new() }
    }

    /// Appends a new record and returns its index
    pub fn push(&mut self, command_line: impl Into<OsString>) -> usize {
        self.children.push(ChildProcess::new(command_line));
        self.children.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&ChildProcess> {
        self.children.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut ChildProcess> {
        self.children.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChildProcess> {
        self.children.iter()
    }

    pub(crate) fn unfinished_mut(&mut self) -> impl Iterator<Item = &mut ChildProcess> {
        self.children.iter_mut().filter(|child| !child.is_finished())
    }

    /// Pids of every record that was successfully launched
    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.children.iter().filter_map(|child| child.pid)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn all_finished(&self) -> bool {
        self.children.iter().all(ChildProcess::is_finished)
    }

    /// Logs one summary entry per record
    pub fn log_summary(&self) {
        for child in &self.children {
            info!(
                "pid:{}, status={}, exit={}, termsig={}, abnormal_exit={} finished={}",
                child.pid.map(Pid::as_raw).unwrap_or(0),
                child.raw_status.unwrap_or(0),
                child.exit_code(),
                child.terminating_signal(),
                child.is_abnormal(),
                child.is_finished(),
            );
            info!("cmd={}", child.command_line.to_string_lossy());
        }
    }
}
