//! Small pure text helpers.

/// Truncate a string to fit within `max_total` characters, appending `suffix` if truncated.
///
/// The suffix counts toward the limit: the returned string is at most `max_total` characters.
#[must_use]
pub fn truncate_to_fit(raw: &str, max_total: usize, suffix: &str) -> String {
    if raw.chars().count() <= max_total {
        return raw.to_string();
    }
    let take = max_total.saturating_sub(suffix.chars().count());
    let head: String = raw.chars().take(take).collect();
    format!("{head}{suffix}")
}

/// Truncate a string to a maximum length, adding `...` if needed.
///
/// - Trims surrounding whitespace before truncating.
/// - Uses `char` count (not bytes) to avoid splitting Unicode scalar values.
/// - Enforces a minimum `max` of 3 so the ellipsis fits.
#[must_use]
pub fn truncate_with_ellipsis(raw: &str, max: usize) -> String {
    let max = max.max(3);
    truncate_to_fit(raw.trim(), max, "...")
}
