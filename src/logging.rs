use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a stderr `tracing` subscriber for embedding applications and tools.
///
/// `RUST_LOG` takes precedence; otherwise the crate logs at `debug` when `verbose` is set and
/// at `info` otherwise. Calling this twice is harmless: the second install is ignored.
pub fn init(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("program_graph={log_level}")));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
