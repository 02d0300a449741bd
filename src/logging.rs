use env_logger::{Builder, Env};
use log::LevelFilter;

/// Filter used when `RUST_LOG` is unset: this crate at `info` (or `debug`,
/// which logs every executed block), everything else at `warn`.
pub fn default_filter(verbose: bool) -> String {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    format!("warn,{}={}", env!("CARGO_CRATE_NAME"), level)
}

/// Installs the global logger with millisecond timestamps, so interleaved
/// chains can be told apart in the output.
pub fn init(verbose: bool) {
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter(verbose)));
    builder.format_timestamp_millis();
    // Already set, e.g. by an earlier test.
    let _ = builder.try_init();
}
