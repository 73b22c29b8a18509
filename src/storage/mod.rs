//! Block device exerciser.
//!
//! Writes a per-block pattern to a device and reads it back, retrying
//! transfers that fail while the storage underneath recovers.

pub mod device;
pub mod pattern;

use clap::{ArgGroup, Parser};
use eyre::eyre;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::Result;
use device::{Access, BlockDevice, RetryPolicy};
use pattern::{differences, fill_pattern, AlignedBlock, Difference};

/// Write, read and verify fixed size blocks on a device
#[derive(Parser, Debug)]
#[command(name = "e2e-storage-tester")]
#[command(version)]
#[command(group(ArgGroup::new("mode").required(true).multiple(true).args(["read", "verify", "write"])))]
pub struct Cli {
    /// Read the blocks
    #[arg(short = 'r')]
    pub read: bool,

    /// Read the blocks and check their contents
    #[arg(short = 'v')]
    pub verify: bool,

    /// Write the blocks
    #[arg(short = 'w')]
    pub write: bool,

    /// Number of blocks
    #[arg(short = 'n', default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub blocks: u64,

    /// Seconds allowed for retried I/O attempts, negative means do not retry
    #[arg(short = 't', default_value_t = 50, allow_negative_numbers = true, value_parser = parse_timeout)]
    pub timeout_secs: i64,

    /// Seconds between retried I/O attempts
    #[arg(short = 'i', long = "retry-interval", default_value_t = 5)]
    pub retry_interval_secs: u64,

    /// Open the device without O_DIRECT
    #[arg(long)]
    pub buffered: bool,

    /// Device or file to exercise
    pub device: PathBuf,
}

fn parse_timeout(value: &str) -> std::result::Result<i64, String> {
    match value.parse::<i64>() {
        Ok(0) => Err("invalid timeout".to_string()),
        Ok(secs) => Ok(secs),
        Err(e) => Err(e.to_string()),
    }
}

/// What one run of the exerciser does
#[derive(Debug, Clone)]
pub struct TesterOptions {
    pub device: PathBuf,
    pub blocks: u64,
    pub write: bool,
    pub read: bool,
    pub verify: bool,
    pub retry: RetryPolicy,
    pub direct: bool,
}

impl From<Cli> for TesterOptions {
    fn from(cli: Cli) -> Self {
        Self {
            device: cli.device,
            blocks: cli.blocks,
            write: cli.write,
            read: cli.read,
            verify: cli.verify,
            retry: RetryPolicy::from_secs(cli.retry_interval_secs, cli.timeout_secs),
            direct: !cli.buffered,
        }
    }
}

/// Outcome of a run: blocks completed by the last phase, and whether the
/// run succeeded
#[derive(Debug)]
pub struct RunOutcome {
    pub blocks_done: u64,
    pub result: Result<()>,
}

/// Runs the write phase (if requested) and then the read or verify phase
pub fn run(options: &TesterOptions) -> RunOutcome {
    let mut outcome = RunOutcome {
        blocks_done: 0,
        result: Ok(()),
    };

    if options.write {
        outcome = write_pass(options);
        if let Err(e) = &outcome.result {
            error!("write failure: {}", e);
        }
    }

    if options.read || options.verify {
        let read = read_pass(options);
        if let Err(e) = &read.result {
            error!("read failure: {}", e);
        }
        // an earlier write failure still fails the run
        outcome = RunOutcome {
            blocks_done: read.blocks_done,
            result: outcome.result.and(read.result),
        };
    }

    outcome
}

fn write_pass(options: &TesterOptions) -> RunOutcome {
    let device = match BlockDevice::open(&options.device, Access::Write, options.direct) {
        Ok(device) => device,
        Err(e) => return RunOutcome { blocks_done: 0, result: Err(e) },
    };
    info!("writing:");

    let mut buf = AlignedBlock::zeroed();
    let mut progress = Progress::new(options.blocks);
    for block in 0..options.blocks {
        fill_pattern(block, buf.as_mut_slice());
        if let Err(e) = device.write_block(block, &buf, &options.retry) {
            return RunOutcome { blocks_done: block, result: Err(e) };
        }
        progress.advance(block + 1);
    }
    RunOutcome { blocks_done: options.blocks, result: Ok(()) }
}

fn read_pass(options: &TesterOptions) -> RunOutcome {
    let device = match BlockDevice::open(&options.device, Access::Read, options.direct) {
        Ok(device) => device,
        Err(e) => return RunOutcome { blocks_done: 0, result: Err(e) },
    };
    info!("{}:", if options.verify { "verifying" } else { "reading" });

    let mut buf = AlignedBlock::zeroed();
    let mut expected = AlignedBlock::zeroed();
    let mut progress = Progress::new(options.blocks);
    for block in 0..options.blocks {
        if let Err(e) = device.read_block(block, &mut buf, &options.retry) {
            return RunOutcome { blocks_done: block, result: Err(e) };
        }
        if options.verify {
            let diffs = check_block(block, &buf, &mut expected);
            if !diffs.is_empty() {
                warn!("differences:");
                for diff in &diffs {
                    warn!("{:#x}: {:#04x} {:#04x}", diff.offset, diff.actual, diff.expected);
                }
                return RunOutcome {
                    blocks_done: block,
                    result: Err(eyre!("buffers mismatch at block {}", block)),
                };
            }
        }
        progress.advance(block + 1);
    }
    RunOutcome { blocks_done: options.blocks, result: Ok(()) }
}

/// Compares a block read from the device with the pattern written for it
fn check_block(block: u64, read: &AlignedBlock, expected: &mut AlignedBlock) -> Vec<Difference> {
    fill_pattern(block, expected.as_mut_slice());
    differences(expected.as_slice(), read.as_slice())
}

/// Logs progress in steps of 10%
struct Progress {
    blocks: u64,
    tenths: u64,
}

impl Progress {
    fn new(blocks: u64) -> Self {
        Self { blocks, tenths: 0 }
    }

    fn advance(&mut self, done: u64) {
        while self.blocks > 0 && done * 10 / self.blocks > self.tenths {
            self.tenths += 1;
            info!("{}%", self.tenths * 10);
        }
    }
}
