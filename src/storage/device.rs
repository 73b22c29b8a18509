use eyre::{eyre, WrapErr};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use super::pattern::{AlignedBlock, BLOCK_SIZE};
use crate::Result;

/// How long a failing block transfer keeps being retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between two attempts
    pub interval: Duration,
    /// Total pause after which the transfer is given up, `None` for no retry
    pub timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Builds a policy from command line seconds; a negative timeout disables retries
    pub fn from_secs(interval_secs: u64, timeout_secs: i64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            timeout: u64::try_from(timeout_secs).ok().map(Duration::from_secs),
        }
    }

    pub fn no_retry() -> Self {
        Self {
            interval: Duration::ZERO,
            timeout: None,
        }
    }

    fn should_retry(&self, waited: Duration) -> bool {
        match self.timeout {
            Some(timeout) => !self.interval.is_zero() && waited < timeout,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    fn verb(&self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
        }
    }
}

/// A device (or file) opened for whole-block transfers
pub struct BlockDevice {
    file: File,
}

impl BlockDevice {
    /// Opens `path` for reading or writing.
    ///
    /// # Arguments
    /// * `path` - Device or file to open
    /// * `access` - Read or write
    /// * `direct` - Bypass the page cache with `O_DIRECT`
    ///
    /// # Returns
    /// * `Result<Self>` - The opened device or an error
    pub fn open(path: &Path, access: Access, direct: bool) -> Result<Self> {
        let mut options = OpenOptions::new();
        match access {
            Access::Read => options.read(true),
            Access::Write => options.write(true),
        };
        if direct {
            options.custom_flags(libc::O_DIRECT);
        }
        let file = options
            .open(path)
            .wrap_err_with(|| format!("could not open {}", path.display()))?;
        Ok(Self { file })
    }

    /// Writes `buf` as block number `block`, retrying per `retry`
    pub fn write_block(&self, block: u64, buf: &AlignedBlock, retry: &RetryPolicy) -> Result<()> {
        with_retry(Access::Write, block, retry, || {
            self.file.write_at(buf.as_slice(), offset(block))
        })
    }

    /// Reads block number `block` into `buf`, retrying per `retry`
    pub fn read_block(&self, block: u64, buf: &mut AlignedBlock, retry: &RetryPolicy) -> Result<()> {
        with_retry(Access::Read, block, retry, || {
            self.file.read_at(buf.as_mut_slice(), offset(block))
        })
    }
}

fn offset(block: u64) -> u64 {
    block * BLOCK_SIZE as u64
}

fn with_retry(
    access: Access,
    block: u64,
    retry: &RetryPolicy,
    mut attempt: impl FnMut() -> io::Result<usize>,
) -> Result<()> {
    let mut waited = Duration::ZERO;
    loop {
        match attempt() {
            Ok(n) if n == BLOCK_SIZE => return Ok(()),
            Ok(n) => warn!(
                "could not {} at block {}, wanted {}, got {}",
                access.verb(),
                block,
                BLOCK_SIZE,
                n
            ),
            Err(e) => warn!("could not {} at block {}: {}", access.verb(), block, e),
        }
        if !retry.should_retry(waited) {
            return Err(eyre!(
                "{} failed at block {} after retrying for {}s",
                access.verb(),
                block,
                waited.as_secs()
            ));
        }
        warn!("attempted seconds {} vs timeout {:?}", waited.as_secs(), retry.timeout);
        std::thread::sleep(retry.interval);
        waited += retry.interval;
    }
}
