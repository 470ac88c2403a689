//! Keyword text normalization and volume parsing.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

// Grade, volume, page and lesson markers glued to their number ("lớp12").
static NUMBERED_MARKER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(lớp|tập|trang|bài)\s*(\d+)").expect("Invalid regex"));

static DIGIT_RUN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Invalid regex"));

/// Canonicalize a keyword before embedding.
///
/// Lowercases, collapses whitespace runs to a single space, re-spaces
/// numbered markers to `word digit` and trims. Never fails.
pub fn normalize_keyword(text: &str) -> String {
    let lowered = text.to_lowercase();
    let collapsed = WHITESPACE_PATTERN.replace_all(&lowered, " ");
    let respaced = NUMBERED_MARKER_PATTERN.replace_all(&collapsed, "$1 $2");
    respaced.trim().to_string()
}

/// Parse a search volume from a loosely formatted string.
///
/// Thousands separators and spaces are stripped and the remainder parsed as
/// a number (fractions truncate). When that fails every digit run is joined,
/// so `"1.234.567"` still reads as 1234567. Anything else is 0.
pub fn parse_volume_str(raw: &str) -> u64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0;
    }

    let compact: String = trimmed.chars().filter(|c| *c != ',' && *c != ' ').collect();
    if let Ok(value) = compact.parse::<f64>() {
        return parse_volume_f64(value);
    }

    let digits: String = DIGIT_RUN_PATTERN
        .find_iter(trimmed)
        .map(|m| m.as_str())
        .collect();
    digits.parse::<u64>().unwrap_or(0)
}

/// Truncate a float volume; NaN, infinities and negatives read as 0.
pub fn parse_volume_f64(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.trunc() as u64
}

/// Parse a search volume from any JSON value.
pub fn parse_volume(value: &Value) -> u64 {
    match value {
        Value::Null | Value::Bool(_) => 0,
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else if let Some(f) = n.as_f64() {
                parse_volume_f64(f)
            } else {
                0
            }
        }
        Value::String(s) => parse_volume_str(s),
        Value::Array(_) | Value::Object(_) => 0,
    }
}
