// Utility helpers for the "dirty" CSV values.
//
// Everything past the loader works with trimmed strings and plain counts.
use num_format::{Locale, ToFormattedString};

/// Largest tally accepted; anything above is treated as a bad cell.
pub const MAX_COUNT: u64 = (1 << 53) - 1;

/// Parse a tally cell into a non-negative count.
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace and strips thousands separators.
/// - Accepts decimal renderings such as `"12.0"` that database text casts
///   produce, truncating toward zero.
/// - Returns `None` for blanks, text, negatives, non-finite values and
///   anything above [`MAX_COUNT`].
pub fn parse_count_safe(s: Option<&str>) -> Option<u64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let s = s.replace(',', "");
    if let Ok(n) = s.parse::<u64>() {
        return (n <= MAX_COUNT).then_some(n);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v <= MAX_COUNT as f64 => Some(v.trunc() as u64),
        _ => None,
    }
}

/// Trim a text cell, mapping absent values to the empty string.
pub fn clean_text(s: Option<String>) -> String {
    s.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Trim an optional cell, keeping `None` for absent or blank values.
pub fn clean_optional(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Counts in console messages, e.g. `9,855 rows loaded`.
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_tolerate_csv_noise() {
        assert_eq!(parse_count_safe(Some(" 1,204 ")), Some(1204));
        assert_eq!(parse_count_safe(Some("7.0")), Some(7));
        assert_eq!(parse_count_safe(Some("")), None);
        assert_eq!(parse_count_safe(Some("n/a")), None);
        assert_eq!(parse_count_safe(Some("-3")), None);
        assert_eq!(parse_count_safe(None), None);
    }

    #[test]
    fn implausible_counts_are_rejected() {
        assert_eq!(parse_count_safe(Some("18446744073709551615")), None);
        assert_eq!(parse_count_safe(Some("1e20")), None);
        assert_eq!(parse_count_safe(Some("9007199254740992")), None);
        assert_eq!(parse_count_safe(Some("9007199254740991")), Some(MAX_COUNT));
    }

    #[test]
    fn blank_optional_text_is_none() {
        assert_eq!(clean_optional(Some("   ".into())), None);
        assert_eq!(clean_optional(Some(" Apr (4/2025) ".into())).as_deref(), Some("Apr (4/2025)"));
        assert_eq!(clean_text(None), "");
    }

    #[test]
    fn thousands_separator() {
        assert_eq!(format_int(9855u64), "9,855");
    }
}
