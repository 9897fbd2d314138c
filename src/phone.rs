//! Phone number normalization to E.164.
//!
//! Tenants type phone numbers however their country writes them: with or
//! without a country code, with a leading trunk zero, with spaces, dots,
//! dashes or parentheses. Everything downstream (deduplication, display, the
//! SMS carrier) needs a single canonical form, so normalization must be
//! deterministic and total: the same input always yields the same output and
//! no input panics.
//!
//! The country rules are checked in a fixed order because some patterns
//! overlap (a Swiss `07[4-9]` mobile is also a syntactically valid French
//! `07` mobile). Reordering the checks changes results; don't.

/// Normalize a raw phone number string into E.164 form.
///
/// Already-canonical input (`+<digits>`) is returned unchanged. A `00`
/// international prefix becomes `+`. National formats are matched against an
/// ordered set of country rules; a 9-digit number matching none of them
/// defaults to Portugal. Anything else gets a best-effort `+` prefix. Empty
/// input returns the empty string.
pub fn normalize(raw: &str) -> String {
    // Keep digits plus a leading '+' only.
    let trimmed = raw.trim();
    let mut cleaned = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        if c.is_ascii_digit() || (c == '+' && i == 0) {
            cleaned.push(c);
        }
    }

    if cleaned.is_empty() {
        return String::new();
    }

    if let Some(rest) = cleaned.strip_prefix('+') {
        if rest.is_empty() {
            return String::new();
        }
        return cleaned;
    }

    if let Some(rest) = cleaned.strip_prefix("00") {
        if rest.is_empty() {
            return String::new();
        }
        return format!("+{rest}");
    }

    let digits = cleaned.as_str();
    let len = digits.len();

    // Leading-zero national mobile formats. Swiss 07[4-9] must be tested
    // before the French 0[6-7,9] rule, and Portuguese 09[1236] before the
    // French 09 range.
    if len == 10 && digits.starts_with("07") && matches!(digits.as_bytes()[2], b'4'..=b'9') {
        return format!("+41{}", &digits[1..]);
    }
    if len == 10 && digits.starts_with("09") && matches!(digits.as_bytes()[2], b'1' | b'2' | b'3' | b'6') {
        return format!("+351{}", &digits[1..]);
    }
    if len == 10 && matches!(&digits[..2], "06" | "07" | "09") {
        return format!("+33{}", &digits[1..]);
    }
    if len == 11 && digits.starts_with("07") {
        return format!("+44{}", &digits[1..]);
    }
    if (len == 11 || len == 12) && digits.starts_with("01") && matches!(digits.as_bytes()[2], b'5'..=b'7') {
        return format!("+49{}", &digits[1..]);
    }

    // Bare national mobile formats (no trunk zero).
    if (len == 9 || len == 10) && digits.starts_with('3') {
        return format!("+39{digits}");
    }
    if len == 9 && matches!(digits.as_bytes()[0], b'6' | b'7') {
        return format!("+34{digits}");
    }
    if len == 9 && digits.starts_with('9') && matches!(digits.as_bytes()[1], b'1' | b'2' | b'3' | b'6') {
        return format!("+351{digits}");
    }

    // 10-digit North American numbers (area code cannot start with 0 or 1).
    if len == 10 && matches!(digits.as_bytes()[0], b'2'..=b'9') {
        return format!("+1{digits}");
    }

    // Fallbacks: any other 9-digit number is assumed Portuguese; everything
    // else gets a best-effort '+'.
    if len == 9 {
        return format!("+351{digits}");
    }
    format!("+{digits}")
}
