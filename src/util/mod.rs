//! Utility functions for common operations.
//!
//! - **Intervals**: parsing human-readable poll intervals (`30s`, `1h30m`)
//! - **Text processing**: HTML entity decoding and terminal-safe output
//! - **URL validation**: checking feed URLs before they are stored

mod interval;
mod text;
mod url_validator;

pub use interval::{parse_interval, IntervalError};
pub use text::{strip_control_chars, unescape_html};
pub use url_validator::{validate_url, UrlValidationError};
