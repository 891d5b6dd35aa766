//! Per-module switchable logging on top of the `log` facade.
//!
//! The engine runs once per frame, so chatty modules (smoother, segmenter)
//! keep their output behind a module-level flag instead of relying only on
//! the global level filter:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_debug, log_info};
//!
//! log_debug!("frame {} knee={:.1}", index, knee);
//! ```
//!
//! The macros never configure a logger. Installing one (e.g. `env_logger`)
//! is the binary's job.

/// Debug-level log gated by the caller's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Info-level log gated by the caller's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn-level log gated by the caller's `ENABLE_LOGS` const.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}
