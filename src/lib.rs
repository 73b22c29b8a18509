//! Local process supervisor with fault injection for end-to-end storage tests.
//!
//! The `e2e-fio` binary walks a directive stream, launches benchmark workloads
//! as separate processes, waits for all of them and reduces their terminations
//! to one exit value. The `e2e-storage-tester` binary exercises a block device.

pub type Result<T> = color_eyre::eyre::Result<T>;

pub mod aggregate;
pub mod config;
pub mod directives;
pub mod fault;
pub mod launcher;
pub mod logging;
pub mod reaper;
pub mod registry;
pub mod shell;
pub mod storage;
pub mod supervisor;
pub mod termination;
