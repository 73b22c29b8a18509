use anyhow::{Context, Result};
use nix::{sys::signal::Signal, unistd::Pid};
use std::collections::HashMap;
use std::fs::File;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::timeout;

/// Stand-in for fio: its first argument selects how it terminates
const FAKE_FIO: &str = r#"#!/bin/sh
case "$1" in
    --minimal) exit 0 ;;
    --bad-args) exit 7 ;;
    --exits-with) exit "$2" ;;
    --long-running) exec sleep 60 ;;
    --mark-start) : > started; exit 0 ;;
esac
exit 0
"#;

/// Runs the supervisor binary inside a scratch directory with a fake fio
pub struct SupervisorHarness {
    supervisor_binary: PathBuf,
    temp_dir: TempDir,
    environment: HashMap<String, String>,
    cleanup_pids: Vec<Pid>,
    spawned: usize,
}

impl SupervisorHarness {
    /// Create a new harness with a fake fio and fast polling
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new().context("Failed to create temporary directory")?;

        let fake_fio = temp_dir.path().join("fake-fio");
        std::fs::write(&fake_fio, FAKE_FIO).context("Failed to write fake fio")?;
        std::fs::set_permissions(&fake_fio, std::fs::Permissions::from_mode(0o755))?;

        let mut harness = Self {
            supervisor_binary: PathBuf::from(env!("CARGO_BIN_EXE_e2e-fio")),
            temp_dir,
            environment: HashMap::new(),
            cleanup_pids: Vec::new(),
            spawned: 0,
        };
        harness.set_environment("E2E_FIO_EXECUTABLE", fake_fio.display().to_string());
        harness.set_environment("E2E_FIO_POLL_INTERVAL_MS", "100");
        harness.set_environment("E2E_FIO_KILL_GRACE_MS", "200");
        harness.set_environment("RUST_LOG", "info");
        Ok(harness)
    }

    /// Set an environment variable for spawned supervisors
    pub fn set_environment(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.environment.insert(key.into(), value.into());
    }

    /// The supervisor's working directory
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Spawn the supervisor with the given directives
    pub async fn spawn_supervisor(&mut self, args: &[&str]) -> Result<TestProcess> {
        self.spawned += 1;
        let log_path = self.temp_dir.path().join(format!("supervisor-{}.log", self.spawned));
        let log = File::create(&log_path).context("Failed to create supervisor log")?;

        let mut cmd = Command::new(&self.supervisor_binary);
        cmd.args(args)
            .current_dir(self.temp_dir.path())
            .envs(&self.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log));

        // Own process group so that workloads left behind can be cleaned up
        cmd.process_group(0);

        let start_time = Instant::now();
        let child = cmd.spawn().context("Failed to spawn supervisor")?;
        let pid = Pid::from_raw(
            child
                .id()
                .ok_or_else(|| anyhow::anyhow!("Failed to get supervisor PID"))? as i32,
        );
        self.cleanup_pids.push(pid);

        Ok(TestProcess {
            pid,
            start_time,
            child,
            log_path,
        })
    }

    /// Run the supervisor to completion
    pub async fn run_supervisor(&mut self, args: &[&str], limit: Duration) -> Result<(ExitStatus, String)> {
        let mut process = self.spawn_supervisor(args).await?;
        let status = process
            .wait_for_exit_timeout(limit)
            .await?
            .ok_or_else(|| anyhow::anyhow!("supervisor still running after {:?}", limit))?;
        Ok((status, process.output()?))
    }

    /// Names of the per-workload directories created in the scratch directory
    pub fn workspace_dirs(&self) -> Result<Vec<String>> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(self.temp_dir.path())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() && name.chars().all(|c| c.is_ascii_digit()) {
                dirs.push(name);
            }
        }
        Ok(dirs)
    }

    /// When each `--mark-start` workload began, read from the marker it left
    /// in its working directory. Sorted oldest first.
    pub fn start_marks(&self) -> Result<Vec<SystemTime>> {
        let mut marks = Vec::new();
        for dir in self.workspace_dirs()? {
            let marker = self.temp_dir.path().join(dir).join("started");
            if marker.exists() {
                marks.push(std::fs::metadata(&marker)?.modified()?);
            }
        }
        marks.sort();
        Ok(marks)
    }
}

impl Drop for SupervisorHarness {
    fn drop(&mut self) {
        // Kill whatever is left in each supervisor's process group
        for pid in &self.cleanup_pids {
            let _ = nix::sys::signal::kill(Pid::from_raw(-pid.as_raw()), Signal::SIGKILL);
        }
    }
}

/// A spawned supervisor
pub struct TestProcess {
    pub pid: Pid,
    pub start_time: Instant,
    child: tokio::process::Child,
    log_path: PathBuf,
}

impl TestProcess {
    /// Wait for process exit with a timeout
    pub async fn wait_for_exit_timeout(&mut self, duration: Duration) -> Result<Option<ExitStatus>> {
        match timeout(duration, self.child.wait()).await {
            Ok(result) => Ok(Some(result.context("Process wait failed")?)),
            Err(_) => Ok(None),
        }
    }

    /// Time since the supervisor was spawned
    pub fn runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Everything the supervisor and its workloads wrote so far
    pub fn output(&self) -> Result<String> {
        std::fs::read_to_string(&self.log_path).context("Failed to read supervisor log")
    }
}
