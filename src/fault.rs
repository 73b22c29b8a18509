use nix::sys::signal::{kill, raise, signal, SigHandler, Signal};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::registry::Registry;

/// Simulates a node crash: after a delay, kill every workload and then
/// terminate the supervisor with SIGSEGV.
pub struct FaultInjector {
    delay: Duration,
    kill_grace: Duration,
}

impl FaultInjector {
    /// Creates a fault injector
    ///
    /// # Arguments
    /// * `delay` - Time to wait before crashing
    /// * `kill_grace` - Pause after killing the workloads, before the crash
    pub fn new(delay: Duration, kill_grace: Duration) -> Self {
        Self { delay, kill_grace }
    }

    /// Waits for the configured delay; follow with [`FaultInjector::crash`]
    pub async fn wait(&self) {
        info!("Segfaulting after {} seconds", self.delay.as_secs());
        sleep(self.delay).await;
    }

    /// Kills every workload with SIGKILL, then raises SIGSEGV against the
    /// supervisor.
    pub fn crash(&self, registry: &Registry) -> ! {
        if !registry.is_empty() {
            kill_all(registry, Signal::SIGKILL);
            std::thread::sleep(self.kill_grace);
        }
        error!("Segfaulting now!");

        // std's stack overflow handler returns on a raised SIGSEGV.
        // SAFETY: restoring the default disposition has no handler to race with.
        if let Err(e) = unsafe { signal(Signal::SIGSEGV, SigHandler::SigDfl) } {
            warn!("could not restore default SIGSEGV handler: {}", e);
        }
        if let Err(e) = raise(Signal::SIGSEGV) {
            error!("raise(SIGSEGV) failed: {}", e);
        }
        std::process::abort()
    }
}

/// Sends `signal` to every launched workload.
///
/// # Returns
/// * `usize` - Number of workloads the signal was delivered to
pub fn kill_all(registry: &Registry, signal: Signal) -> usize {
    let mut delivered = 0;
    for pid in registry.pids() {
        match kill(pid, signal) {
            Ok(()) => delivered += 1,
            // already gone, the reaper never gets to run anyway
            Err(e) => warn!("could not send {} to {}: {}", signal, pid, e),
        }
    }
    delivered
}
