//! Time source and display formatting helpers.

pub mod clock;
pub mod format;

pub use clock::Clock;
pub use format::{age_display, format_percent, progress_bar, truncate_string};
