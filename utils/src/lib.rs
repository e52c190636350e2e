//! Shared utilities for Prism.

pub mod format;
pub mod logging;
pub mod time;

pub use format::{format_percent, format_sats};
pub use logging::init_tracing;
pub use time::{format_duration, format_until};
