const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const BASE: f64 = 1024.0;

/// Default number of decimal digits used by [`strfsize`]
pub const DEFAULT_DIGITS: u32 = 3;

/// More decimals than an `f64` can hold; larger requests are clamped
pub const MAX_DIGITS: u32 = 15;

/// Format a byte count as a human readable size, e.g. `1.205 KB`.
///
/// The value is divided by the largest power of 1024 not exceeding it (TB at
/// most) and rounded to `digits` decimal places, at most [`MAX_DIGITS`].
/// At least one decimal is always printed, so 22 bytes is `22.0 B`.
pub fn strfsize(size: u64, digits: u32) -> String {
    if size == 0 {
        return format!("{:?} {}", 0.0_f64, UNITS[0]);
    }

    // Integer steps, a float log lands just below exact powers of 1024
    let mut exp = 0;
    let mut threshold = 1024_u64;
    while exp < UNITS.len() - 1 && size >= threshold {
        exp += 1;
        threshold = threshold.saturating_mul(1024);
    }
    let scaled = size as f64 / BASE.powi(exp as i32);

    let factor = 10_f64.powi(digits.min(MAX_DIGITS) as i32);
    let rounded = (scaled * factor).round() / factor;

    // Debug formatting keeps the shortest round-trip form and a trailing `.0`
    format!("{:?} {}", rounded, UNITS[exp])
}
