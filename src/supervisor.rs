use std::ffi::OsString;
use std::num::NonZeroI32;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::aggregate::final_exit_value;
use crate::config::Settings;
use crate::directives::{Directive, Directives, USAGE};
use crate::fault::FaultInjector;
use crate::launcher::{LaunchOutcome, Launcher};
use crate::reaper::Reaper;
use crate::registry::Registry;
use crate::shell;
use crate::termination::TerminationReason;
use crate::Result;

/// Walks the directive stream and drives the other components.
///
/// Workloads are launched as their groups are scanned and run concurrently
/// with the rest of the scan. Once the scan is done the fault injector runs
/// if one was requested, otherwise the reaper waits for every workload and
/// the exit value is computed.
pub struct Supervisor {
    settings: Settings,
    registry: Registry,
    launcher: Launcher,
    reaper: Reaper,
    fault: Option<FaultInjector>,
    exit_override: Option<NonZeroI32>,
}

impl Supervisor {
    pub fn new(settings: Settings) -> Result<Self> {
        let launcher = Launcher::new(&settings.shell, &settings.workspace_root)?;
        let reaper = Reaper::new(settings.poll_interval());
        Ok(Self {
            settings,
            registry: Registry::new(),
            launcher,
            reaper,
            fault: None,
            exit_override: None,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Processes `args` and returns the exit value for the supervisor.
    ///
    /// Does not return if a `segfault-after` directive was given. A failing
    /// `command` directive ends the run with an error, leaving any launched
    /// workloads running.
    ///
    /// # Arguments
    /// * `args` - The directive stream, without the program name
    ///
    /// # Returns
    /// * `Result<i32>` - The final exit value
    pub async fn run(&mut self, args: &[OsString]) -> Result<i32> {
        if args.is_empty() {
            info!("{}", USAGE);
        }

        let executable = self.settings.executable.clone();
        for directive in Directives::new(args, &executable) {
            self.dispatch(directive).await?;
        }

        if let Some(fault) = &self.fault {
            fault.wait().await;
            fault.crash(&self.registry);
        }

        self.reaper.wait_all(&mut self.registry).await;

        info!("");
        self.registry.log_summary();

        let exit_value = final_exit_value(&self.registry, self.exit_override);
        info!("Exit value is {}", exit_value);
        Ok(exit_value)
    }

    async fn dispatch(&mut self, directive: Directive) -> Result<()> {
        match directive {
            Directive::Sleep(duration) => {
                info!("sleeping {} seconds", duration.as_secs());
                sleep(duration).await;
            }
            Directive::SegfaultAfter(delay) => {
                info!("will segfault {} seconds after launching workloads", delay.as_secs());
                self.fault = Some(FaultInjector::new(delay, self.settings.kill_grace()));
            }
            Directive::Launch(command_line) => self.launch(command_line),
            Directive::Command(command_line) => {
                if command_line.is_empty() {
                    warn!("Ignoring empty command");
                } else {
                    shell::run_blocking(&self.settings.shell, &command_line).await?;
                }
            }
            Directive::ExitOverride(value) => {
                info!("Overriding exit value to {}", value);
                self.exit_override = Some(value);
            }
            Directive::Ignored(token) => info!("Ignoring {}", token.to_string_lossy()),
        }
        Ok(())
    }

    fn launch(&mut self, command_line: OsString) {
        let index = self.registry.push(command_line);
        let Some(record) = self.registry.get_mut(index) else {
            return;
        };
        if let LaunchOutcome::Failed(error) = self.launcher.launch(record) {
            warn!("** {} for {} **", error, record.command_line().to_string_lossy());
            record.finish(None, TerminationReason::ExitedWith(error.exit_code()));
        }
    }
}
