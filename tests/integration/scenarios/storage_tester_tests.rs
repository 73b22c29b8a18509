use anyhow::Result;
use std::os::unix::fs::FileExt;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

const BLOCK_SIZE: u64 = 4096;

fn run_tester(args: &[&str]) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_e2e-storage-tester"))
        .args(args)
        .output()?)
}

#[test]
fn test_write_and_verify_reports_block_count() -> Result<()> {
    let device = NamedTempFile::new()?;
    let path = device.path().to_string_lossy().into_owned();

    let output = run_tester(&["-w", "-v", "-n", "8", "--buffered", &path])?;

    assert!(output.status.success(), "stderr:\n{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "8");
    assert_eq!(device.as_file().metadata()?.len(), 8 * BLOCK_SIZE);
    Ok(())
}

#[test]
fn test_verify_mismatch_fails() -> Result<()> {
    let device = NamedTempFile::new()?;
    let path = device.path().to_string_lossy().into_owned();
    assert!(run_tester(&["-w", "-n", "6", "--buffered", &path])?.status.success());

    device.as_file().write_at(&[0x5a], 4 * BLOCK_SIZE + 9)?;

    let output = run_tester(&["-v", "-n", "6", "-t", "-1", "--buffered", &path])?;
    assert!(!output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "4");
    assert!(String::from_utf8_lossy(&output.stderr).contains("buffers mismatch at block 4"));
    Ok(())
}

#[test]
fn test_mode_is_required() -> Result<()> {
    let device = NamedTempFile::new()?;
    let path = device.path().to_string_lossy().into_owned();
    let output = run_tester(&[path.as_str()])?;
    assert!(!output.status.success());
    Ok(())
}
