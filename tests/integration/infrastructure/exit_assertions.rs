use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// Exit-status assertions for integration tests

/// Assert that the supervisor exited normally with `expected`
pub fn assert_exit_value(status: ExitStatus, expected: i32, output: &str) {
    assert_eq!(
        status.code(),
        Some(expected),
        "unexpected exit status {:?}, output:\n{}",
        status,
        output
    );
    assert!(
        output.contains(&format!("Exit value is {}", expected)),
        "final exit value line missing, output:\n{}",
        output
    );
}

/// Assert that the supervisor was terminated by `signal` rather than exiting
pub fn assert_killed_by(status: ExitStatus, signal: i32, output: &str) {
    assert_eq!(
        status.signal(),
        Some(signal),
        "expected termination by signal {}, got {:?}, output:\n{}",
        signal,
        status,
        output
    );
    assert_eq!(status.code(), None, "supervisor should not exit normally");
}
