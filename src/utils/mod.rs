//! Utility helpers shared by the diagnostics operations

pub mod address_parser;

pub use address_parser::{parse_suffix, require_target, resolve_target, Ipv4Prefix};

/// Format a millisecond value with two decimals, e.g. `12.34 ms`
pub fn format_millis(millis: f64) -> String {
    format!("{:.2} ms", millis)
}
