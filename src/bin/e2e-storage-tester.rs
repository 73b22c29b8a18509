use clap::Parser;
use e2e_fio::logging;
use e2e_fio::storage::{self, Cli, TesterOptions};
use e2e_fio::Result;
use std::io::Write;
use tracing::info;

fn main() -> Result<()> {
    color_eyre::install()?;
    logging::init_stderr();

    info!(
        "e2e-storage-tester {}, args: {}",
        env!("CARGO_PKG_VERSION"),
        std::env::args_os()
            .skip(1)
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let options = TesterOptions::from(Cli::parse());
    let outcome = storage::run(&options);

    // stdout carries only the number of blocks done by the last phase
    print!("{}", outcome.blocks_done);
    std::io::stdout().flush()?;
    outcome.result
}
