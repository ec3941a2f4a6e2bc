//! Logging setup for the `neros` binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! binary's job. Output goes to stderr so stdout stays clean for reports.

use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` wins over `base_level` when set. Calling this twice is harmless:
/// the second installation attempt is ignored.
pub fn init_logging(base_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(base_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging("debug");
        init_logging("not a valid filter ((");
    }
}
