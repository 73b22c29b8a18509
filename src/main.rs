use e2e_fio::config::Settings;
use e2e_fio::logging;
use e2e_fio::supervisor::Supervisor;
use e2e_fio::Result;
use std::ffi::OsString;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    logging::init_stdout();

    info!("e2e-fio: version {}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::from_env()?;
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();

    let mut supervisor = Supervisor::new(settings)?;
    let exit_value = supervisor.run(&args).await?;

    std::process::exit(exit_value)
}
