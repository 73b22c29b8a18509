use std::num::NonZeroI32;

use crate::registry::Registry;

/// Reduces every child's termination to one exit value.
///
/// Records are scanned in launch order and the last non-zero contribution
/// wins: the exit code for a normal exit, 254 for a signal death, 255 for an
/// unrecognized status. A registry where every child exited 0 yields 0.
///
/// # Arguments
/// * `registry` - The registry after the reaper has classified every record
///
/// # Returns
/// * `i32` - The child-derived exit value
pub fn children_exit_value(registry: &Registry) -> i32 {
    registry
        .iter()
        .filter_map(|child| child.termination())
        .map(|reason| reason.exit_value())
        .fold(0, |current, value| if value != 0 { value } else { current })
}

/// The supervisor's final exit value.
///
/// An operator override always wins; `exitv 0` never reaches this point
/// because zero is not representable as an override.
pub fn final_exit_value(registry: &Registry, exit_override: Option<NonZeroI32>) -> i32 {
    match exit_override {
        Some(value) => value.get(),
        None => children_exit_value(registry),
    }
}
