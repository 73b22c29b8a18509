use std::fmt;

use nix::sys::signal::Signal;

/// Exit value contributed by a child that was killed by a signal.
pub const SIGNALED_EXIT_VALUE: i32 = 254;
/// Exit value contributed by a child whose wait status could not be decoded.
pub const UNRECOGNIZED_EXIT_VALUE: i32 = 255;

/// How a child process terminated, decoded from the raw `waitpid` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The child called `exit` (or returned from main) with this code
    ExitedWith(i32),
    /// The child was terminated by this signal number
    KilledBySignal(i32),
    /// The status had a shape the supervisor does not handle
    Unrecognized,
}

impl TerminationReason {
    /// Decodes a raw wait status as returned by `waitpid`.
    ///
    /// # Arguments
    /// * `raw` - The status word filled in by the OS
    ///
    /// # Returns
    /// * `Self` - The decoded termination reason
    pub fn decode(raw: i32) -> Self {
        if libc::WIFEXITED(raw) {
            TerminationReason::ExitedWith(libc::WEXITSTATUS(raw))
        } else if libc::WIFSIGNALED(raw) {
            TerminationReason::KilledBySignal(libc::WTERMSIG(raw))
        } else {
            TerminationReason::Unrecognized
        }
    }

    /// The value this termination contributes to the aggregated exit value.
    ///
    /// Zero means "nothing to report"; see [`crate::aggregate`].
    pub fn exit_value(&self) -> i32 {
        match *self {
            TerminationReason::ExitedWith(code) => code,
            TerminationReason::KilledBySignal(_) => SIGNALED_EXIT_VALUE,
            TerminationReason::Unrecognized => UNRECOGNIZED_EXIT_VALUE,
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TerminationReason::ExitedWith(code) => write!(f, "exit value = {}", code),
            TerminationReason::KilledBySignal(sig) => match Signal::try_from(sig) {
                Ok(signal) => write!(f, "termsig {} ({})", sig, signal),
                Err(_) => write!(f, "termsig {}", sig),
            },
            TerminationReason::Unrecognized => write!(f, "unrecognized wait status"),
        }
    }
}
