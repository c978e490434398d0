// Tracing setup for the binary; library code only emits

/// Filter used when `RUST_LOG` is not set, by verbosity count
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "yt_grab=warn",
        1 => "yt_grab=info",
        _ => "yt_grab=debug",
    }
}

/// Install a stderr fmt subscriber. `RUST_LOG` wins over `verbosity`.
/// Calling it twice is harmless.
pub fn init_tracing(verbosity: u8) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(verbosity).into());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
