//! Common time helpers for tapwatch_core.

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: f64 = 1_000.0;

/// Seconds from `earlier_ms` to `later_ms`.
/// - Saturates to zero when `later_ms` is not after `earlier_ms`.
#[inline]
pub fn secs_between(earlier_ms: u64, later_ms: u64) -> f64 {
    later_ms.saturating_sub(earlier_ms) as f64 / MILLIS_PER_SEC
}

/// Render a duration in seconds for humans, e.g. `2h 05m`, `3m 20s`, `45s`.
///
/// Shows the two most significant units. Non-finite input renders as `∞`.
pub fn format_eta(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "∞".to_string();
    }
    let total = seconds.max(0.0).ceil() as u64;
    let (d, rem) = (total / 86_400, total % 86_400);
    let (h, rem) = (rem / 3_600, rem % 3_600);
    let (m, s) = (rem / 60, rem % 60);
    match (d, h, m) {
        (0, 0, 0) => format!("{s}s"),
        (0, 0, _) => format!("{m}m {s:02}s"),
        (0, _, _) => format!("{h}h {m:02}m"),
        _ => format!("{d}d {h:02}h"),
    }
}
