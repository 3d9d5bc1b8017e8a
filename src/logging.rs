use tracing_subscriber::EnvFilter;

/// Default directive for a verbosity count: info, then debug, then trace.
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Log to stderr so `resolve` output on stdout stays clean. `RUST_LOG` wins
/// over the verbosity flags.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
