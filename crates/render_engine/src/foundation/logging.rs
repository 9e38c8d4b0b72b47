//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// `default_level` is used as the filter when `RUST_LOG` is not set.
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    if env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .is_err()
    {
        log::trace!("Logger already initialized");
    }
}

/// Initialize logging for unit tests, capturing output per test
#[cfg(test)]
pub(crate) fn init_test() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        init_test();
        init("debug");
        init("warn");
        log::info!("logger still usable");
    }
}
