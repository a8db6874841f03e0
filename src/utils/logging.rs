//! Logger setup plus conditional logging macros gated on a module-level
//! `ENABLE_LOGS` flag.
//!
//! Usage:
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("flushed {} uploads", count);
//! ```

/// Installs `env_logger`. `RUST_LOG` wins when set; otherwise the level is
/// Info, or Debug with `TEAMSYNC_DEBUG=1`.
pub fn init_logging() {
    let level = match std::env::var("TEAMSYNC_DEBUG").as_deref() {
        Ok("1") | Ok("true") => log::LevelFilter::Debug,
        _ => log::LevelFilter::Info,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();
    // A second init (tests, embedding apps) keeps the first logger.
    let _ = builder.try_init();
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// Chatty per-iteration output from background loops.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENABLE_LOGS: bool = true;

    #[test]
    fn init_is_repeatable_and_macros_expand() {
        init_logging();
        init_logging();
        log_info!("logging initialised");
        log_debug!("debug {}", 1);
    }
}
