//! Utility functions for string and time formatting.

pub mod format;

pub use format::{age_display, capitalize, relative_time, truncate_chars, truncate_string};
