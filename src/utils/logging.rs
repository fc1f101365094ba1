//! Conditional logging macros gated on a module-level `ENABLE_LOGS` const,
//! so chatty paths (the sampling loops) can be silenced per module without
//! touching the global log filter.
//!
//! Each module using these must define:
//! ```rust
//! const ENABLE_LOGS: bool = true; // or false
//! ```

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
