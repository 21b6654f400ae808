//! Number rendering for the run summary.

/// Render a count with `,` between groups of three digits.
///
/// ```
/// use callstats_core::formatting::format_count;
///
/// assert_eq!(format_count(7), "7");
/// assert_eq!(format_count(48_213), "48,213");
/// assert_eq!(format_count(1_000_000), "1,000,000");
/// ```
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Share of `part` in `whole` as a percentage, rounded to `decimal_places`.
/// An empty `whole` yields `0.0`.
///
/// ```
/// use callstats_core::formatting::percentage;
///
/// assert_eq!(percentage(1, 4, 1), 25.0);
/// assert_eq!(percentage(3, 0, 1), 0.0);
/// ```
pub fn percentage(part: u64, whole: u64, decimal_places: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let scale = 10_f64.powi(decimal_places as i32);
    (part as f64 * 100.0 / whole as f64 * scale).round() / scale
}
