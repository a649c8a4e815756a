//! Utility modules

pub mod content_filter;

pub use content_filter::{is_probably_binary, is_sensitive_path};
