//! RTE Kernel: fixed-point decimal arithmetic.
//!
//! Scores and thresholds are compared as i64 fixed-point (SCALE = 10_000).
//! No float. Stored element values keep the exact text the content wrote;
//! these helpers only parse for validation and derivation.

/// Fixed-point scale factor. A real value `r` is represented as `r * SCALE`.
pub const SCALE: i64 = 10_000;

/// Number of fractional digits carried by `SCALE`.
const SCALE_DIGITS: usize = 4;

/// Checked integer addition.
pub fn checked_add(a: i64, b: i64) -> Option<i64> {
    a.checked_add(b)
}

/// Checked integer subtraction.
pub fn checked_sub(a: i64, b: i64) -> Option<i64> {
    a.checked_sub(b)
}

/// Checked integer multiplication.
pub fn checked_mul(a: i64, b: i64) -> Option<i64> {
    a.checked_mul(b)
}

/// Parse a decimal string (`-12`, `85.5`, `.75`, `0.8125000`) into fixed-point.
///
/// Fraction digits beyond the fourth are truncated. Exponents, signs other
/// than a single leading `-`/`+`, and empty input are rejected.
pub fn parse_decimal(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, body) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let int_value: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };

    let mut frac_value: i64 = 0;
    for (idx, ch) in frac_part.bytes().take(SCALE_DIGITS).enumerate() {
        let digit = i64::from(ch - b'0');
        frac_value += digit * 10_i64.pow((SCALE_DIGITS - 1 - idx) as u32);
    }

    let magnitude = checked_add(checked_mul(int_value, SCALE)?, frac_value)?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Render a fixed-point value as a minimal decimal string (`8500` → `0.85`).
pub fn format_decimal(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    let scale = SCALE as u64;
    let int_part = magnitude / scale;
    let frac_part = magnitude % scale;
    if frac_part == 0 {
        return format!("{}{}", sign, int_part);
    }
    let frac = format!("{:04}", frac_part);
    format!("{}{}.{}", sign, int_part, frac.trim_end_matches('0'))
}

/// Scaled score `(raw - min) / (max - min)` in fixed-point.
///
/// Returns `None` when the range is empty or inverted. `min` defaults to 0
/// at the call site when the content never set it.
pub fn scaled_from_raw(raw: i64, min: i64, max: i64) -> Option<i64> {
    let range = checked_sub(max, min)?;
    if range <= 0 {
        return None;
    }
    let offset = checked_sub(raw, min)?;
    Some(checked_mul(offset, SCALE)? / range)
}

/// True if `value` lies within `[low, high]` (both fixed-point).
pub fn within(value: i64, low: i64, high: i64) -> bool {
    value >= low && value <= high
}
