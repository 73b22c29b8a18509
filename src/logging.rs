use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` if set, `info` otherwise
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Progress output on stdout, interleaved with the workloads' own output
pub fn init_stdout() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(env_filter())
        .init();
}

/// Diagnostics on stderr, for tools that reserve stdout for their result
pub fn init_stderr() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(env_filter())
        .init();
}
