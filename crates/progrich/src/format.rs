//! Column formatting for progress rows
//!
//! Pure helpers: no styling, no terminal access. Widgets apply colors on top.

use crate::theme::Layout;
use std::time::Duration;

/// Placeholder shown while the remaining time is unknown.
pub const UNKNOWN_ETA: &str = "-:--:--";

/// Format a duration as `H:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Estimate the remaining time from the average rate so far.
///
/// `None` before any progress has been made or once the total is reached.
pub fn estimate_remaining(current: u64, total: u64, elapsed: Duration) -> Option<Duration> {
    if current == 0 || current >= total {
        return None;
    }
    let per_unit = elapsed.as_secs_f64() / current as f64;
    Some(Duration::from_secs_f64(per_unit * (total - current) as f64))
}

/// Format the ETA column.
pub fn format_eta(current: u64, total: u64, elapsed: Duration) -> String {
    estimate_remaining(current, total, elapsed)
        .map_or_else(|| UNKNOWN_ETA.to_string(), format_elapsed)
}

/// Completed fraction, clamped to `0.0..=1.0`. A zero total counts as done.
pub fn fraction(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (current as f64 / total as f64).clamp(0.0, 1.0)
}

/// Right-aligned percentage, e.g. `  4%`.
pub fn format_percent(current: u64, total: u64) -> String {
    format!("{:>3}%", (fraction(current, total) * 100.0).floor() as u64)
}

/// `current/total`, with `current` padded to the width of `total`.
pub fn format_count(current: u64, total: u64) -> String {
    let width = total.to_string().len();
    format!("{current:>width$}/{total}")
}

/// Split a bar into its filled and remaining glyphs.
///
/// The filled part ends in a half cell when the fraction lands in the second
/// half of a cell.
pub fn bar_segments(fraction: f64, layout: &Layout) -> (String, String) {
    let width = layout.bar_width;
    let halves = (fraction.clamp(0.0, 1.0) * (width * 2) as f64).floor() as usize;
    let full = halves / 2;
    let half = halves % 2 == 1;

    let mut filled: String = std::iter::repeat_n(layout.bar_full, full).collect();
    if half {
        filled.push(layout.bar_half);
    }
    let used = full + usize::from(half);
    let remaining = std::iter::repeat_n(layout.bar_full, width - used).collect();
    (filled, remaining)
}
