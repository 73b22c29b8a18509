use crate::integration::infrastructure::{assert_killed_by, SupervisorHarness};
use anyhow::Result;
use std::time::Duration;

/// After the delay the workload is killed and the supervisor dies of SIGSEGV
#[tokio::test]
async fn test_segfault_after_kills_workloads_and_supervisor() -> Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut harness = SupervisorHarness::new()?;
    let mut process = harness
        .spawn_supervisor(&["segfault-after", "2", "--", "--long-running"])
        .await?;

    let status = process
        .wait_for_exit_timeout(Duration::from_secs(20))
        .await?
        .expect("supervisor did not crash");
    let output = process.output()?;

    assert_killed_by(status, libc::SIGSEGV, &output);
    assert!(process.runtime() >= Duration::from_secs(2));
    assert!(output.contains("Segfaulting now!"));
    // the crash happens instead of reaping, so no exit value is reported
    assert!(!output.contains("Exit value is"));
    Ok(())
}

/// The crash happens even when nothing was launched
#[tokio::test]
async fn test_segfault_after_without_workloads() -> Result<()> {
    let mut harness = SupervisorHarness::new()?;
    let mut process = harness.spawn_supervisor(&["segfault-after", "1"]).await?;

    let status = process
        .wait_for_exit_timeout(Duration::from_secs(20))
        .await?
        .expect("supervisor did not crash");

    assert_killed_by(status, libc::SIGSEGV, &process.output()?);
    Ok(())
}

/// An invalid delay leaves the directive unrecognized, so no crash
#[tokio::test]
async fn test_invalid_segfault_delay_is_skipped() -> Result<()> {
    let mut harness = SupervisorHarness::new()?;
    let (status, output) = harness
        .run_supervisor(&["segfault-after", "0", "--", "--minimal"], Duration::from_secs(20))
        .await?;

    assert_eq!(status.code(), Some(0), "output:\n{}", output);
    assert!(output.contains("Ignoring segfault-after"));
    Ok(())
}
