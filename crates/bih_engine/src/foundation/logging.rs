//! Logging utilities
//!
//! Thin layer over the `log` facade; binaries pick the backend.

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with a fixed minimum level, ignoring `RUST_LOG`
pub fn init_with_level(level: LevelFilter) {
    env_logger::Builder::new().filter_level(level).init();
}
