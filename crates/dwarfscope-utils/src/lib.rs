//! # dwarfscope utilities
//!
//! Shared helpers for the dwarfscope workspace. At the moment this is the
//! `tracing` setup used by the command-line tool.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    init_logging, init_logging_to_file, init_logging_with_level, LogConfig, LogFormat, LogGuard, LogLevel, LoggingError,
};
pub use tracing::{debug, error, info, trace, warn};
